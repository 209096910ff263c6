//! Domain Entities - Core business objects
//!
//! Traffic influence subscriptions, PFD management transactions, the AF
//! entries that own them, and the problem details exchanged with both the
//! AF and the core network.

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{SouthboundTarget, UP_PATH_CHANGE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};

/// Traffic influence subscription payload submitted by an AF (3GPP TS 29.522).
///
/// Only the attributes the gateway interprets are typed. Nested 3GPP
/// structures stay opaque and unknown attributes are carried through
/// untouched in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfluSub {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub af_service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub af_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub af_trans_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_relo_ind: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snssai: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_group_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_ue_ind: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribed_events: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpsi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dnai_chg_type: Option<String>,
    /// Callback URI the AF wants event notifications delivered to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_destination: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_filters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_traffic_filters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_routes: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_validities: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_geo_zone_ids: Option<Vec<String>>,
    /// Location of this subscription, filled in by the gateway
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

impl TrafficInfluSub {
    /// Check the attributes an AF must always provide.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !present(&self.af_trans_id) {
            return Err(ValidationError::MissingAttribute("afTransId"));
        }

        // Without a service identifier the DNN has to be given explicitly
        if !present(&self.af_service_id) && !present(&self.dnn) {
            return Err(ValidationError::MissingAttribute("afServiceId"));
        }

        if !present(&self.af_app_id)
            && self.traffic_filters.is_none()
            && self.eth_traffic_filters.is_none()
        {
            return Err(ValidationError::MissingTrafficDescriptor);
        }

        Ok(())
    }

    /// Which core network function owns the derived policy.
    ///
    /// Single-UE requests go to the PCF, group and any-UE requests to the UDR.
    pub fn southbound_target(&self) -> Option<SouthboundTarget> {
        if present(&self.gpsi) || present(&self.ipv4_addr) || present(&self.ipv6_addr) {
            Some(SouthboundTarget::Pcf)
        } else if present(&self.external_group_id) || self.any_ue_ind.unwrap_or(false) {
            Some(SouthboundTarget::Udr)
        } else {
            None
        }
    }

    /// Whether the AF asked to be told about user plane path changes.
    pub fn requests_up_path_change(&self) -> bool {
        self.subscribed_events
            .as_ref()
            .and_then(|events| events.first())
            .is_some_and(|event| event == UP_PATH_CHANGE)
    }

    /// Merge a partial update. Absent patch attributes leave the stored value alone.
    pub fn apply_patch(&mut self, patch: &TrafficInfluSubPatch) {
        if let Some(app_relo_ind) = patch.app_relo_ind {
            self.app_relo_ind = Some(app_relo_ind);
        }
        if let Some(filters) = &patch.traffic_filters {
            self.traffic_filters = Some(filters.clone());
        }
        if let Some(filters) = &patch.eth_traffic_filters {
            self.eth_traffic_filters = Some(filters.clone());
        }
        if let Some(routes) = &patch.traffic_routes {
            self.traffic_routes = Some(routes.clone());
        }
        if let Some(validities) = &patch.temp_validities {
            self.temp_validities = Some(validities.clone());
        }
        if let Some(zones) = &patch.valid_geo_zone_ids {
            self.valid_geo_zone_ids = Some(zones.clone());
        }
    }
}

/// Partial update of a traffic influence subscription.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficInfluSubPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_relo_ind: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_filters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eth_traffic_filters: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_routes: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_validities: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_geo_zone_ids: Option<Vec<String>>,
}

impl TrafficInfluSubPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The southbound resource derived from a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SouthboundBinding {
    /// Function holding the resource
    pub target: SouthboundTarget,
    /// App session id (PCF) or influence id (UDR)
    pub resource_id: String,
}

/// One accepted AF subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
    /// Owning AF
    pub af_id: String,
    /// Decimal id, unique within the owning AF entry
    pub id: String,
    /// Absolute URI returned to the AF in the Location header
    pub location: String,
    /// Token the SMF echoes back in user plane notifications
    pub correlation_id: Option<String>,
    /// Payload as last written by the AF
    pub payload: TrafficInfluSub,
    /// Southbound resource, if the subscription was forwarded
    pub binding: Option<SouthboundBinding>,
}

/// Packet flow description supplied by an AF (TS 29.122 `Pfd`).
///
/// Exactly one of the three content lists must be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pfd {
    #[serde(alias = "pfdID", default)]
    pub pfd_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_names: Vec<String>,
}

impl Pfd {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pfd_id.is_empty() {
            return Err(ValidationError::MissingAttribute("pfdId"));
        }
        let kinds = [
            !self.flow_descriptions.is_empty(),
            !self.urls.is_empty(),
            !self.domain_names.is_empty(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count();

        match kinds {
            0 => Err(ValidationError::MissingPfdContent(self.pfd_id.clone())),
            1 => Ok(()),
            _ => Err(ValidationError::AmbiguousPfdContent(self.pfd_id.clone())),
        }
    }
}

/// PFDs of one external application (TS 29.122 `PfdData`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdData {
    #[serde(alias = "externalAppID", default)]
    pub external_app_id: String,
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    /// PFDs keyed by PFD id
    #[serde(default)]
    pub pfds: BTreeMap<String, Pfd>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_delay: Option<u64>,
    /// Seconds the UPF may cache the PFDs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching_time: Option<u64>,
}

impl PfdData {
    /// Check the application id and that at least one PFD is given.
    pub fn validate_shape(&self) -> Result<(), ValidationError> {
        if self.pfds.is_empty() {
            return Err(ValidationError::MissingPfdData);
        }
        if self.external_app_id.is_empty() {
            return Err(ValidationError::MissingAttribute("externalAppId"));
        }
        Ok(())
    }

    /// Shape check plus every PFD's content.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_shape()?;
        self.pfds.values().try_for_each(Pfd::validate)
    }

    /// Replace the PFDs that already exist under the same id. PFD ids the
    /// application does not have are ignored. Returns how many were replaced.
    pub fn merge_pfds(&mut self, patch: &PfdData) -> usize {
        let mut replaced = 0;
        for (id, pfd) in &patch.pfds {
            if let Some(existing) = self.pfds.get_mut(id) {
                *existing = pfd.clone();
                replaced += 1;
            }
        }
        replaced
    }

    /// The UDR representation of this application's PFDs.
    pub fn to_udr(&self, caching_deadline: Option<String>) -> PfdDataForApp {
        PfdDataForApp {
            app_id: self.external_app_id.clone(),
            pfds: self
                .pfds
                .values()
                .map(|pfd| PfdContent {
                    pfd_id: pfd.pfd_id.clone(),
                    flow_descriptions: pfd.flow_descriptions.clone(),
                    urls: pfd.urls.clone(),
                    domain_names: pfd.domain_names.clone(),
                })
                .collect(),
            caching_time: caching_deadline,
        }
    }
}

/// Why an application of a PFD transaction was not provisioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    Malfunction,
    ResourceLimitation,
    ShortDelay,
    AppIdDuplicated,
    OtherReason,
}

impl FailureCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCode::Malfunction => "MALFUNCTION",
            FailureCode::ResourceLimitation => "RESOURCE_LIMITATION",
            FailureCode::ShortDelay => "SHORT_DELAY",
            FailureCode::AppIdDuplicated => "APP_ID_DUPLICATED",
            FailureCode::OtherReason => "OTHER_REASON",
        }
    }
}

/// Applications rejected for one failure code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdReport {
    pub external_app_ids: Vec<String>,
    pub failure_code: FailureCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching_time: Option<u64>,
}

/// A PFD management transaction (TS 29.122 `PfdManagement`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdManagement {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supp_feat: Option<String>,
    /// Applications keyed by external application id
    #[serde(default)]
    pub pfd_datas: BTreeMap<String, PfdData>,
    /// Rejected applications keyed by failure code
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub pfd_reports: BTreeMap<String, PfdReport>,
}

impl PfdManagement {
    /// Every application needs an id and at least one PFD.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pfd_datas.is_empty() {
            return Err(ValidationError::MissingPfdData);
        }
        self.pfd_datas.values().try_for_each(PfdData::validate_shape)
    }

    /// Move `app_id` out of the transaction into the report for `code`.
    pub fn reject(&mut self, app_id: &str, code: FailureCode) {
        self.pfd_datas.remove(app_id);
        self.pfd_reports
            .entry(code.as_str().to_string())
            .or_insert_with(|| PfdReport {
                external_app_ids: Vec::new(),
                failure_code: code,
                caching_time: None,
            })
            .external_app_ids
            .push(app_id.to_string());
    }

    pub fn app_ids(&self) -> Vec<String> {
        self.pfd_datas.keys().cloned().collect()
    }
}

/// PFD content as stored in the UDR (TS 29.551 `PfdContent`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdContent {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pfd_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flow_descriptions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_names: Vec<String>,
}

/// PFDs of one application as stored in the UDR (TS 29.519 `PfdDataForApp`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PfdDataForApp {
    pub app_id: String,
    pub pfds: Vec<PfdContent>,
    /// Absolute expiry of the cached PFDs (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caching_time: Option<String>,
}

/// One accepted PFD transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PfdTransaction {
    pub af_id: String,
    /// Decimal id, unique within the owning AF entry
    pub id: String,
    /// Absolute URI returned to the AF in the Location header
    pub location: String,
    pub payload: PfdManagement,
}

impl PfdTransaction {
    pub fn application_location(&self, app_id: &str) -> String {
        application_location(&self.location, app_id)
    }
}

pub fn application_location(transaction_location: &str, app_id: &str) -> String {
    format!("{}/applications/{}", transaction_location, app_id)
}

/// Per-AF bookkeeping: id cursors, in-flight reservations, subscriptions
/// and PFD transactions.
#[derive(Debug, Clone, PartialEq)]
pub struct AfEntry {
    pub af_id: String,
    /// Next subscription id to hand out
    pub next_sub_id: u64,
    /// Slots reserved for creations still waiting on the southbound
    pub pending: usize,
    pub subscriptions: HashMap<String, Subscription>,
    /// Next PFD transaction id to hand out
    pub next_trans_id: u64,
    /// Transaction slots reserved while the UDR is written
    pub pending_transactions: usize,
    pub transactions: HashMap<String, PfdTransaction>,
}

impl AfEntry {
    pub fn new(af_id: impl Into<String>, sub_start_id: u64, trans_start_id: u64) -> Self {
        Self {
            af_id: af_id.into(),
            next_sub_id: sub_start_id,
            pending: 0,
            subscriptions: HashMap::new(),
            next_trans_id: trans_start_id,
            pending_transactions: 0,
            transactions: HashMap::new(),
        }
    }

    /// Subscriptions plus reservations; this is what the quota applies to.
    pub fn active_count(&self) -> usize {
        self.subscriptions.len() + self.pending
    }

    /// PFD transactions plus reservations.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len() + self.pending_transactions
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0 && self.transaction_count() == 0
    }

    /// Hand out the next subscription id. Ids are never handed back.
    pub fn allocate_id(&mut self) -> String {
        let id = self.next_sub_id.to_string();
        self.next_sub_id += 1;
        id
    }

    /// Hand out the next PFD transaction id.
    pub fn allocate_trans_id(&mut self) -> String {
        let id = self.next_trans_id.to_string();
        self.next_trans_id += 1;
        id
    }
}

/// RFC 7807 problem details as used by 3GPP SBI.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_params: Option<Vec<Value>>,
}

impl ProblemDetails {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Self::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_payload() -> TrafficInfluSub {
        serde_json::from_value(json!({
            "afServiceId": "Service1",
            "afAppId": "app001",
            "afTransId": "trans001",
            "gpsi": "5g-gpsi-1",
            "notificationDestination": "http://af.example:8050/notify",
            "trafficRoutes": [{"dnai": "edge-1"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_deserialize_keeps_unknown_attributes() {
        let ti: TrafficInfluSub = serde_json::from_value(json!({
            "afTransId": "t1",
            "suppFeat": "ab",
            "requestTestNotification": true
        }))
        .unwrap();

        assert_eq!(ti.af_trans_id.as_deref(), Some("t1"));
        assert_eq!(ti.extra.get("suppFeat"), Some(&json!("ab")));

        let back = serde_json::to_value(&ti).unwrap();
        assert_eq!(back["requestTestNotification"], json!(true));
        assert!(back.get("gpsi").is_none());
    }

    #[test]
    fn test_self_link_uses_self_key() {
        let mut ti = valid_payload();
        ti.self_link = Some("http://nef/sub/1".to_string());
        let value = serde_json::to_value(&ti).unwrap();
        assert_eq!(value["self"], json!("http://nef/sub/1"));
    }

    #[test]
    fn test_validate_accepts_complete_payload() {
        assert!(valid_payload().validate().is_ok());
    }

    #[test]
    fn test_validate_requires_trans_id() {
        let mut ti = valid_payload();
        ti.af_trans_id = Some(String::new());
        assert_eq!(
            ti.validate(),
            Err(ValidationError::MissingAttribute("afTransId"))
        );
    }

    #[test]
    fn test_validate_accepts_dnn_instead_of_service_id() {
        let mut ti = valid_payload();
        ti.af_service_id = None;
        assert!(ti.validate().is_err());

        ti.dnn = Some("edge.dnn".to_string());
        assert!(ti.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_traffic_descriptor() {
        let mut ti = valid_payload();
        ti.af_app_id = None;
        assert_eq!(ti.validate(), Err(ValidationError::MissingTrafficDescriptor));

        ti.traffic_filters = Some(vec![json!({"flowId": 1})]);
        assert!(ti.validate().is_ok());
    }

    #[test]
    fn test_southbound_target_selection() {
        let ti = valid_payload();
        assert_eq!(ti.southbound_target(), Some(SouthboundTarget::Pcf));

        let group = TrafficInfluSub {
            external_group_id: Some("group-1".to_string()),
            ..TrafficInfluSub::default()
        };
        assert_eq!(group.southbound_target(), Some(SouthboundTarget::Udr));

        let any_ue = TrafficInfluSub {
            any_ue_ind: Some(true),
            ..TrafficInfluSub::default()
        };
        assert_eq!(any_ue.southbound_target(), Some(SouthboundTarget::Udr));

        assert_eq!(TrafficInfluSub::default().southbound_target(), None);
    }

    #[test]
    fn test_requests_up_path_change() {
        let mut ti = valid_payload();
        assert!(!ti.requests_up_path_change());

        ti.subscribed_events = Some(vec!["UP_PATH_CHANGE".to_string()]);
        assert!(ti.requests_up_path_change());
    }

    #[test]
    fn test_apply_patch_only_touches_present_fields() {
        let mut ti = valid_payload();
        let before = ti.clone();

        let patch = TrafficInfluSubPatch {
            app_relo_ind: Some(true),
            traffic_routes: Some(vec![json!({"dnai": "edge-2"})]),
            ..TrafficInfluSubPatch::default()
        };
        ti.apply_patch(&patch);

        assert_eq!(ti.app_relo_ind, Some(true));
        assert_eq!(ti.traffic_routes, Some(vec![json!({"dnai": "edge-2"})]));
        assert_eq!(ti.af_app_id, before.af_app_id);
        assert_eq!(ti.traffic_filters, before.traffic_filters);
        assert_eq!(ti.notification_destination, before.notification_destination);
    }

    #[test]
    fn test_empty_patch() {
        let patch: TrafficInfluSubPatch = serde_json::from_value(json!({})).unwrap();
        assert!(patch.is_empty());

        let mut ti = valid_payload();
        let before = ti.clone();
        ti.apply_patch(&patch);
        assert_eq!(ti, before);
    }

    #[test]
    fn test_af_entry_allocates_sequential_ids() {
        let mut entry = AfEntry::new("AF_01", 2000, 10000);
        assert!(entry.is_empty());
        assert_eq!(entry.allocate_id(), "2000");
        assert_eq!(entry.allocate_id(), "2001");
        assert_eq!(entry.next_sub_id, 2002);

        // Transaction ids have their own cursor
        assert_eq!(entry.allocate_trans_id(), "10000");
        assert_eq!(entry.allocate_id(), "2002");
    }

    #[test]
    fn test_af_entry_with_pending_transaction_is_not_empty() {
        let mut entry = AfEntry::new("AF_01", 2000, 10000);
        entry.pending_transactions = 1;
        assert_eq!(entry.active_count(), 0);
        assert_eq!(entry.transaction_count(), 1);
        assert!(!entry.is_empty());
    }

    // ===== PFD Tests =====

    fn pfd_management() -> PfdManagement {
        serde_json::from_value(json!({
            "pfdDatas": {
                "app-1": {
                    "externalAppID": "app-1",
                    "pfds": {
                        "pfd-1": {"pfdID": "pfd-1", "urls": ["^http://example.com(/\\S*)?$"]},
                        "pfd-2": {"pfdId": "pfd-2", "domainNames": ["example.com"]}
                    },
                    "cachingTime": 60
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_pfd_management_accepts_both_id_spellings() {
        let trans = pfd_management();
        let app = &trans.pfd_datas["app-1"];
        assert_eq!(app.external_app_id, "app-1");
        assert_eq!(app.pfds["pfd-1"].pfd_id, "pfd-1");
        assert_eq!(app.pfds["pfd-2"].pfd_id, "pfd-2");
        assert!(trans.validate().is_ok());

        let value = serde_json::to_value(&trans).unwrap();
        assert_eq!(value["pfdDatas"]["app-1"]["externalAppId"], json!("app-1"));
        assert!(value.get("pfdReports").is_none());
    }

    #[test]
    fn test_pfd_management_validation() {
        assert_eq!(
            PfdManagement::default().validate(),
            Err(ValidationError::MissingPfdData)
        );

        let mut trans = pfd_management();
        trans.pfd_datas.get_mut("app-1").unwrap().pfds.clear();
        assert_eq!(trans.validate(), Err(ValidationError::MissingPfdData));

        let mut trans = pfd_management();
        trans.pfd_datas.get_mut("app-1").unwrap().external_app_id.clear();
        assert_eq!(
            trans.validate(),
            Err(ValidationError::MissingAttribute("externalAppId"))
        );
    }

    #[test]
    fn test_pfd_content_rules() {
        let mut pfd = Pfd {
            pfd_id: "pfd-1".to_string(),
            ..Pfd::default()
        };
        assert_eq!(
            pfd.validate(),
            Err(ValidationError::MissingPfdContent("pfd-1".to_string()))
        );

        pfd.urls = vec!["http://a".to_string()];
        assert!(pfd.validate().is_ok());

        pfd.domain_names = vec!["a".to_string()];
        assert_eq!(
            pfd.validate(),
            Err(ValidationError::AmbiguousPfdContent("pfd-1".to_string()))
        );

        pfd.pfd_id.clear();
        assert_eq!(pfd.validate(), Err(ValidationError::MissingAttribute("pfdId")));
    }

    #[test]
    fn test_reject_groups_by_failure_code() {
        let mut trans = pfd_management();
        trans.pfd_datas.insert("app-2".to_string(), PfdData::default());
        trans.pfd_datas.insert("app-3".to_string(), PfdData::default());

        trans.reject("app-2", FailureCode::AppIdDuplicated);
        trans.reject("app-3", FailureCode::AppIdDuplicated);

        assert_eq!(trans.app_ids(), vec!["app-1".to_string()]);
        let value = serde_json::to_value(&trans.pfd_reports).unwrap();
        assert_eq!(
            value,
            json!({"APP_ID_DUPLICATED": {
                "externalAppIds": ["app-2", "app-3"],
                "failureCode": "APP_ID_DUPLICATED"
            }})
        );
    }

    #[test]
    fn test_merge_pfds_only_replaces_known_ids() {
        let mut app = pfd_management().pfd_datas.remove("app-1").unwrap();
        let patch: PfdData = serde_json::from_value(json!({
            "externalAppId": "app-1",
            "pfds": {
                "pfd-2": {"pfdId": "pfd-2", "domainNames": ["example.org"]},
                "pfd-9": {"pfdId": "pfd-9", "urls": ["http://new"]}
            }
        }))
        .unwrap();

        assert_eq!(app.merge_pfds(&patch), 1);
        assert_eq!(app.pfds["pfd-2"].domain_names, vec!["example.org".to_string()]);
        assert!(!app.pfds.contains_key("pfd-9"));
        assert_eq!(app.pfds.len(), 2);
    }

    #[test]
    fn test_to_udr() {
        let app = pfd_management().pfd_datas.remove("app-1").unwrap();
        let udr = app.to_udr(Some("2026-01-01T00:00:00Z".to_string()));

        let value = serde_json::to_value(&udr).unwrap();
        assert_eq!(value["appId"], json!("app-1"));
        assert_eq!(value["cachingTime"], json!("2026-01-01T00:00:00Z"));
        assert_eq!(value["pfds"][1], json!({"pfdId": "pfd-2", "domainNames": ["example.com"]}));
    }

    #[test]
    fn test_application_location() {
        assert_eq!(
            application_location("http://nef/3gpp-pfd-management/v1/AF_01/transactions/10000", "app-1"),
            "http://nef/3gpp-pfd-management/v1/AF_01/transactions/10000/applications/app-1"
        );
    }

    #[test]
    fn test_problem_details_serialization() {
        let pd = ProblemDetails::titled("Subscription Not Found").with_status(404);
        let value = serde_json::to_value(&pd).unwrap();
        assert_eq!(value, json!({"title": "Subscription Not Found", "status": 404}));
    }
}
