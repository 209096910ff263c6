//! Traffic Influence Service - Main application use case
//!
//! Validates AF requests, decides whether the PCF or the UDR owns the
//! derived policy, and keeps the registry and the southbound resource in step.

use crate::config::AfServiceConfig;
use crate::domain::entities::{
    PfdReport, ProblemDetails, SouthboundBinding, Subscription, TrafficInfluSub, TrafficInfluSubPatch,
};
use crate::domain::errors::{RegistryError, ValidationError};
use crate::domain::ports::{SouthboundClient, SouthboundError, SouthboundResponse};
use crate::domain::services::SubscriptionRegistry;
use crate::domain::value_objects::SouthboundTarget;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{target} rejected the request with status {status}")]
    Rejected {
        target: SouthboundTarget,
        status: u16,
        problem: ProblemDetails,
    },

    #[error(transparent)]
    Southbound(#[from] SouthboundError),

    #[error("no application of the PFD transaction could be provisioned")]
    PfdNotProvisioned { reports: Vec<PfdReport> },
}

/// Settings the service needs from the gateway configuration.
#[derive(Debug, Clone, Default)]
pub struct ServiceSettings {
    /// Where the core network sends user plane notifications
    pub notification_uri: String,
    pub af_services: Vec<AfServiceConfig>,
}

/// Traffic influence use case.
pub struct TrafficInfluenceService {
    registry: Arc<SubscriptionRegistry>,
    pcf: Arc<dyn SouthboundClient>,
    udr: Arc<dyn SouthboundClient>,
    settings: ServiceSettings,
}

fn insert_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

pub(crate) fn check(target: SouthboundTarget, response: SouthboundResponse) -> Result<SouthboundResponse, ServiceError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ServiceError::Rejected {
            target,
            status: response.status,
            problem: response.problem_or_default(),
        })
    }
}

impl TrafficInfluenceService {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        pcf: Arc<dyn SouthboundClient>,
        udr: Arc<dyn SouthboundClient>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            registry,
            pcf,
            udr,
            settings,
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    fn client_for(&self, target: SouthboundTarget) -> &Arc<dyn SouthboundClient> {
        match target {
            SouthboundTarget::Pcf => &self.pcf,
            SouthboundTarget::Udr => &self.udr,
        }
    }

    /// Create a subscription and its southbound resource.
    ///
    /// The quota slot is reserved before the southbound call and only
    /// committed once the PCF or UDR accepted the request.
    pub async fn create(&self, af_id: &str, ti: TrafficInfluSub) -> Result<Subscription, ServiceError> {
        ti.validate()?;
        let target = ti.southbound_target().ok_or(ValidationError::NoTarget)?;

        let reservation = self.registry.reserve(af_id)?;

        // The PCF always reports path changes, the UDR only when asked to
        let correlation_id = match target {
            SouthboundTarget::Pcf => Some(self.registry.next_correlation_id()),
            SouthboundTarget::Udr if ti.requests_up_path_change() => {
                Some(self.registry.next_correlation_id())
            }
            SouthboundTarget::Udr => None,
        };

        let body = match target {
            SouthboundTarget::Pcf => self.app_session_context(&ti, correlation_id.as_deref()),
            SouthboundTarget::Udr => self.influence_data(&ti, correlation_id.as_deref()),
        };
        let resource_hint = format!("{}-{}", reservation.af_id(), reservation.sub_id());

        // Reservation is released on drop if this returns early
        let created = self.client_for(target).create(&resource_hint, body).await?;
        check(target, created.response)?;

        let binding = SouthboundBinding {
            target,
            resource_id: created.resource_id,
        };
        let subscription = self
            .registry
            .commit(reservation, ti, correlation_id, Some(binding))?;

        tracing::info!(
            "created subscription {}/{} via {} (correlation {})",
            af_id,
            subscription.id,
            target,
            subscription.correlation_id.as_deref().unwrap_or("-")
        );
        Ok(subscription)
    }

    pub fn get(&self, af_id: &str, sub_id: &str) -> Result<Subscription, ServiceError> {
        Ok(self.registry.get_subscription(af_id, sub_id)?)
    }

    /// All subscriptions of an AF. An AF the registry has never seen has none.
    pub fn list(&self, af_id: &str) -> Result<Vec<Subscription>, ServiceError> {
        match self.registry.list_subscriptions(af_id) {
            Ok(subscriptions) => Ok(subscriptions),
            Err(RegistryError::AfNotFound(_)) => {
                tracing::debug!("no subscriptions for unknown AF {}", af_id);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Full replace. The southbound resource is modified with data derived
    /// from the new payload before the registry copy is swapped.
    pub async fn replace(
        &self,
        af_id: &str,
        sub_id: &str,
        ti: TrafficInfluSub,
    ) -> Result<Subscription, ServiceError> {
        ti.validate()?;
        let existing = self.registry.get_subscription(af_id, sub_id)?;

        if let Some(binding) = &existing.binding {
            let corr = existing.correlation_id.as_deref();
            let body = match binding.target {
                SouthboundTarget::Pcf => self.app_session_update(&ti, corr),
                SouthboundTarget::Udr => self.influence_data(&ti, corr),
            };
            let response = self
                .client_for(binding.target)
                .update(&binding.resource_id, body)
                .await?;
            check(binding.target, response)?;
        }

        let updated = self.registry.update_subscription(af_id, sub_id, ti)?;
        tracing::info!("replaced subscription {}/{}", af_id, sub_id);
        Ok(updated)
    }

    pub async fn patch(
        &self,
        af_id: &str,
        sub_id: &str,
        patch: TrafficInfluSubPatch,
    ) -> Result<Subscription, ServiceError> {
        let existing = self.registry.get_subscription(af_id, sub_id)?;
        if patch.is_empty() {
            return Ok(existing);
        }

        if let Some(binding) = &existing.binding {
            let body = match binding.target {
                SouthboundTarget::Pcf => self.pcf_patch_body(&existing, &patch),
                SouthboundTarget::Udr => udr_patch_body(&patch),
            };
            let response = self
                .client_for(binding.target)
                .update(&binding.resource_id, body)
                .await?;
            check(binding.target, response)?;
        }

        let patched = self.registry.patch_subscription(af_id, sub_id, &patch)?;
        tracing::info!("patched subscription {}/{}", af_id, sub_id);
        Ok(patched)
    }

    /// Delete the southbound resource first; the registry entry stays if that fails.
    pub async fn delete(&self, af_id: &str, sub_id: &str) -> Result<Subscription, ServiceError> {
        let existing = self.registry.get_subscription(af_id, sub_id)?;

        if let Some(binding) = &existing.binding {
            let response = self
                .client_for(binding.target)
                .delete(&binding.resource_id)
                .await?;
            check(binding.target, response)?;
        }

        let removed = self.registry.delete_subscription(af_id, sub_id)?;
        tracing::info!("deleted subscription {}/{}", af_id, sub_id);
        Ok(removed)
    }

    fn af_service(&self, ti: &TrafficInfluSub) -> Option<&AfServiceConfig> {
        let id = ti.af_service_id.as_deref()?;
        self.settings.af_services.iter().find(|svc| svc.id == id)
    }

    /// DNN and S-NSSAI from the payload, falling back to the AF service table.
    fn dnn_and_slice(&self, ti: &TrafficInfluSub) -> (Option<String>, Option<Value>) {
        let service = self.af_service(ti);
        let dnn = ti
            .dnn
            .clone()
            .or_else(|| service.map(|svc| svc.dnn.clone()));
        let snssai = ti.snssai.clone().or_else(|| {
            service
                .and_then(|svc| svc.snssai.as_ref())
                .and_then(|snssai| serde_json::to_value(snssai).ok())
        });
        (dnn, snssai)
    }

    fn up_path_subscription(&self, ti: &TrafficInfluSub, correlation_id: Option<&str>) -> Option<Value> {
        let correlation_id = correlation_id?;
        let mut sub = Map::new();
        insert_opt(&mut sub, "dnaiChgType", ti.dnai_chg_type.clone());
        sub.insert(
            "notificationUri".to_string(),
            Value::from(self.settings.notification_uri.clone()),
        );
        sub.insert("notifCorreId".to_string(), Value::from(correlation_id));
        Some(Value::Object(sub))
    }

    fn routing_requirement(&self, ti: &TrafficInfluSub, correlation_id: Option<&str>) -> Value {
        let mut req = Map::new();
        // appReloc tells the PCF relocation is NOT possible
        insert_opt(&mut req, "appReloc", ti.app_relo_ind.map(|ind| !ind));
        insert_opt(&mut req, "routeToLocs", ti.traffic_routes.clone());
        insert_opt(&mut req, "tempVals", ti.temp_validities.clone());
        insert_opt(&mut req, "upPathChgSub", self.up_path_subscription(ti, correlation_id));
        if let Some(zones) = &ti.valid_geo_zone_ids {
            req.insert("spVal".to_string(), json!({ "presenceInfoList": zones }));
        }
        Value::Object(req)
    }

    /// PCF `AppSessionContext` for a single-UE subscription.
    fn app_session_context(&self, ti: &TrafficInfluSub, correlation_id: Option<&str>) -> Value {
        let (dnn, snssai) = self.dnn_and_slice(ti);

        let mut req = Map::new();
        insert_opt(&mut req, "afAppId", ti.af_app_id.clone());
        req.insert(
            "afRoutReq".to_string(),
            self.routing_requirement(ti, correlation_id),
        );
        insert_opt(&mut req, "dnn", dnn);
        insert_opt(&mut req, "sliceInfo", snssai);
        insert_opt(&mut req, "gpsi", ti.gpsi.clone());
        insert_opt(&mut req, "ueIpv4", ti.ipv4_addr.clone());
        insert_opt(&mut req, "ueIpv6", ti.ipv6_addr.clone());
        insert_opt(&mut req, "ueMac", ti.mac_addr.clone());
        req.insert(
            "notifUri".to_string(),
            Value::from(self.settings.notification_uri.clone()),
        );

        json!({ "ascReqData": Value::Object(req) })
    }

    /// PCF `AppSessionContextUpdateData` derived from a full payload.
    fn app_session_update(&self, ti: &TrafficInfluSub, correlation_id: Option<&str>) -> Value {
        let mut update = Map::new();
        insert_opt(&mut update, "afAppId", ti.af_app_id.clone());
        update.insert(
            "afRoutReq".to_string(),
            self.routing_requirement(ti, correlation_id),
        );
        Value::Object(update)
    }

    /// UDR `TrafficInfluData` for group and any-UE subscriptions.
    fn influence_data(&self, ti: &TrafficInfluSub, correlation_id: Option<&str>) -> Value {
        let (dnn, snssai) = self.dnn_and_slice(ti);

        let mut data = Map::new();
        insert_opt(&mut data, "afAppId", ti.af_app_id.clone());
        insert_opt(&mut data, "dnn", dnn);
        insert_opt(&mut data, "snssai", snssai);
        insert_opt(&mut data, "interGroupId", ti.external_group_id.clone());
        if ti.any_ue_ind.unwrap_or(false) {
            data.insert("supi".to_string(), Value::from("anyUE"));
        }
        insert_opt(&mut data, "appReloInd", ti.app_relo_ind);
        insert_opt(&mut data, "trafficFilters", ti.traffic_filters.clone());
        insert_opt(&mut data, "ethTrafficFilters", ti.eth_traffic_filters.clone());
        insert_opt(&mut data, "trafficRoutes", ti.traffic_routes.clone());
        insert_opt(&mut data, "tempValidities", ti.temp_validities.clone());
        if let Some(correlation_id) = correlation_id {
            data.insert(
                "upPathChgNotifUri".to_string(),
                Value::from(self.settings.notification_uri.clone()),
            );
            data.insert("upPathChgNotifCorreId".to_string(), Value::from(correlation_id));
        }
        Value::Object(data)
    }

    /// PCF `AppSessionContextUpdateData` for a partial update.
    ///
    /// The PCF replaces `afRoutReq` as a whole, so the path change
    /// subscription of the stored record is sent again with every patch.
    fn pcf_patch_body(&self, existing: &Subscription, patch: &TrafficInfluSubPatch) -> Value {
        let mut req = Map::new();
        insert_opt(&mut req, "appReloc", patch.app_relo_ind.map(|ind| !ind));
        insert_opt(&mut req, "routeToLocs", patch.traffic_routes.clone());
        insert_opt(&mut req, "tempVals", patch.temp_validities.clone());
        if let Some(zones) = &patch.valid_geo_zone_ids {
            req.insert("spVal".to_string(), json!({ "presenceInfoList": zones }));
        }
        insert_opt(
            &mut req,
            "upPathChgSub",
            self.up_path_subscription(&existing.payload, existing.correlation_id.as_deref()),
        );

        let mut update = Map::new();
        update.insert("afRoutReq".to_string(), Value::Object(req));
        if let Some(filters) = &patch.traffic_filters {
            update.insert(
                "medComponents".to_string(),
                json!({ "0": { "medCompN": 0, "fDescs": filters } }),
            );
        }
        Value::Object(update)
    }
}


fn udr_patch_body(patch: &TrafficInfluSubPatch) -> Value {
    let mut data = Map::new();
    insert_opt(&mut data, "appReloInd", patch.app_relo_ind);
    insert_opt(&mut data, "trafficFilters", patch.traffic_filters.clone());
    insert_opt(&mut data, "ethTrafficFilters", patch.eth_traffic_filters.clone());
    insert_opt(&mut data, "trafficRoutes", patch.traffic_routes.clone());
    insert_opt(&mut data, "tempValidities", patch.temp_validities.clone());
    Value::Object(data)
}
