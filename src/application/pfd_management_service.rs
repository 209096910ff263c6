//! PFD Management Service
//!
//! AF facing use case for packet flow descriptions: transactions of
//! applications are checked, written to the UDR one application at a time
//! and kept in the registry next to the AF's subscriptions.

use super::traffic_influence_service::{check, ServiceError};
use crate::domain::entities::{FailureCode, Pfd, PfdData, PfdDataForApp, PfdManagement, PfdTransaction};
use crate::domain::errors::ValidationError;
use crate::domain::ports::{PfdSouthbound, SouthboundResponse};
use crate::domain::services::SubscriptionRegistry;
use crate::domain::value_objects::SouthboundTarget;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;

/// Longest caching time passed on to the UDR, in seconds.
const MAX_CACHING_SECONDS: u64 = u32::MAX as u64;

/// Absolute expiry handed to the UDR for `caching_time` seconds from now.
fn caching_deadline(caching_time: Option<u64>) -> Option<String> {
    caching_time.map(|seconds| {
        let seconds = seconds.min(MAX_CACHING_SECONDS) as i64;
        let deadline = Utc::now() + chrono::Duration::seconds(seconds);
        deadline.to_rfc3339_opts(SecondsFormat::Secs, true)
    })
}

fn udr_data(app: &PfdData) -> PfdDataForApp {
    app.to_udr(caching_deadline(app.caching_time))
}

/// Take the PFDs the UDR holds for an application, keeping the NEF side
/// attributes of the local copy.
fn refresh_from_udr(local: &mut PfdData, response: SouthboundResponse) {
    let Some(stored) = response
        .body
        .and_then(|body| serde_json::from_value::<PfdDataForApp>(body).ok())
    else {
        return;
    };
    local.pfds = stored
        .pfds
        .into_iter()
        .map(|content| {
            let pfd = Pfd {
                pfd_id: content.pfd_id.clone(),
                flow_descriptions: content.flow_descriptions,
                urls: content.urls,
                domain_names: content.domain_names,
            };
            (content.pfd_id, pfd)
        })
        .collect();
}

/// PFD management use case.
pub struct PfdManagementService {
    registry: Arc<SubscriptionRegistry>,
    udr: Arc<dyn PfdSouthbound>,
}

impl PfdManagementService {
    pub fn new(registry: Arc<SubscriptionRegistry>, udr: Arc<dyn PfdSouthbound>) -> Self {
        Self { registry, udr }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    async fn put_app(&self, app: &PfdData) -> Result<(), ServiceError> {
        let response = self.udr.put_app(&udr_data(app)).await?;
        check(SouthboundTarget::Udr, response)?;
        Ok(())
    }

    async fn fetch_app(&self, app: &mut PfdData) -> Result<(), ServiceError> {
        let response = self.udr.get_app(&app.external_app_id).await?;
        let response = check(SouthboundTarget::Udr, response)?;
        refresh_from_udr(app, response);
        Ok(())
    }

    /// Remove an application from the UDR. An application the UDR no
    /// longer has counts as removed.
    async fn delete_app(&self, app_id: &str) -> Result<(), ServiceError> {
        let response = self.udr.delete_app(app_id).await?;
        if response.status == 404 {
            tracing::debug!("UDR had no PFDs for {}", app_id);
            return Ok(());
        }
        check(SouthboundTarget::Udr, response)?;
        Ok(())
    }

    /// Best effort removal of applications written before a failure.
    async fn roll_back(&self, app_ids: &[String]) {
        for app_id in app_ids {
            if let Err(e) = self.delete_app(app_id).await {
                tracing::warn!("could not roll back PFDs of {}: {}", app_id, e);
            }
        }
    }

    /// Create a PFD transaction.
    ///
    /// Applications with invalid PFDs or an id another transaction already
    /// provisions are left out and reported. If none is left the
    /// transaction fails with the reports.
    pub async fn create(&self, af_id: &str, mut trans: PfdManagement) -> Result<PfdTransaction, ServiceError> {
        trans.validate()?;
        trans.pfd_reports.clear();

        let invalid: Vec<String> = trans
            .pfd_datas
            .iter()
            .filter(|(app_id, data)| data.validate().is_err() || **app_id != data.external_app_id)
            .map(|(app_id, _)| app_id.clone())
            .collect();
        for app_id in &invalid {
            tracing::warn!("PFD application {} of AF {} is invalid", app_id, af_id);
            trans.reject(app_id, FailureCode::OtherReason);
        }

        let reservation = self.registry.reserve_transaction(af_id, &trans.app_ids())?;
        for app_id in reservation.duplicated() {
            tracing::warn!("PFD application {} is already provisioned", app_id);
            trans.reject(app_id, FailureCode::AppIdDuplicated);
        }

        if trans.pfd_datas.is_empty() {
            return Err(ServiceError::PfdNotProvisioned {
                reports: trans.pfd_reports.into_values().collect(),
            });
        }

        // Reservation is released on drop if this returns early
        let mut written = Vec::new();
        for app in trans.pfd_datas.values() {
            if let Err(e) = self.put_app(app).await {
                self.roll_back(&written).await;
                return Err(e);
            }
            written.push(app.external_app_id.clone());
        }

        let transaction = self.registry.commit_transaction(reservation, trans)?;
        tracing::info!(
            "created PFD transaction {}/{} with {} application(s)",
            af_id,
            transaction.id,
            transaction.payload.pfd_datas.len()
        );
        Ok(transaction)
    }

    /// All transactions of an AF; an unknown AF has none.
    pub fn list(&self, af_id: &str) -> Vec<PfdTransaction> {
        self.registry.list_transactions(af_id).unwrap_or_default()
    }

    /// Read a transaction with the PFDs the UDR currently holds.
    pub async fn get(&self, af_id: &str, trans_id: &str) -> Result<PfdTransaction, ServiceError> {
        let mut transaction = self.registry.get_transaction(af_id, trans_id)?;
        for app in transaction.payload.pfd_datas.values_mut() {
            self.fetch_app(app).await?;
        }
        Ok(transaction)
    }

    /// Replace every application of a transaction.
    pub async fn replace(
        &self,
        af_id: &str,
        trans_id: &str,
        trans: PfdManagement,
    ) -> Result<PfdTransaction, ServiceError> {
        trans.validate()?;
        for data in trans.pfd_datas.values() {
            data.validate()?;
        }
        let existing = self.registry.get_transaction(af_id, trans_id)?;
        self.registry
            .check_apps_available(af_id, trans_id, &trans.app_ids())?;

        for app in trans.pfd_datas.values() {
            self.put_app(app).await?;
        }
        for app_id in existing.payload.app_ids() {
            if !trans.pfd_datas.contains_key(&app_id) {
                self.delete_app(&app_id).await?;
            }
        }

        let transaction = self.registry.replace_transaction(af_id, trans_id, trans)?;
        tracing::info!("replaced PFD transaction {}/{}", af_id, trans_id);
        Ok(transaction)
    }

    /// Delete a transaction and the PFDs of all its applications.
    pub async fn delete(&self, af_id: &str, trans_id: &str) -> Result<(), ServiceError> {
        let existing = self.registry.get_transaction(af_id, trans_id)?;
        for app_id in existing.payload.app_ids() {
            self.delete_app(&app_id).await?;
        }
        self.registry.delete_transaction(af_id, trans_id)?;
        tracing::info!("deleted PFD transaction {}/{}", af_id, trans_id);
        Ok(())
    }

    pub async fn get_application(&self, af_id: &str, trans_id: &str, app_id: &str) -> Result<PfdData, ServiceError> {
        let mut app = self.registry.get_application(af_id, trans_id, app_id)?;
        self.fetch_app(&mut app).await?;
        Ok(app)
    }

    /// Replace one application. The body must name the application of the path.
    pub async fn replace_application(
        &self,
        af_id: &str,
        trans_id: &str,
        app_id: &str,
        data: PfdData,
    ) -> Result<PfdData, ServiceError> {
        data.validate()?;
        if data.external_app_id != app_id {
            return Err(ValidationError::AppIdMismatch {
                path: app_id.to_string(),
                body: data.external_app_id,
            }
            .into());
        }
        self.registry.get_application(af_id, trans_id, app_id)?;

        self.put_app(&data).await?;
        Ok(self.registry.replace_application(af_id, trans_id, app_id, data)?)
    }

    /// Update the PFDs of one application that already exist under the
    /// same PFD id. Other PFDs of the patch are ignored.
    pub async fn patch_application(
        &self,
        af_id: &str,
        trans_id: &str,
        app_id: &str,
        patch: PfdData,
    ) -> Result<PfdData, ServiceError> {
        if patch.pfds.is_empty() {
            return Err(ValidationError::MissingPfdData.into());
        }
        if !patch.external_app_id.is_empty() && patch.external_app_id != app_id {
            return Err(ValidationError::AppIdMismatch {
                path: app_id.to_string(),
                body: patch.external_app_id,
            }
            .into());
        }

        let mut merged = self.registry.get_application(af_id, trans_id, app_id)?;
        let replaced = merged.merge_pfds(&patch);
        if patch.caching_time.is_some() {
            merged.caching_time = patch.caching_time;
        }
        if patch.allowed_delay.is_some() {
            merged.allowed_delay = patch.allowed_delay;
        }
        merged.validate()?;
        tracing::debug!("PFD patch of {} replaces {} PFD(s)", app_id, replaced);

        self.put_app(&merged).await?;
        Ok(self.registry.replace_application(af_id, trans_id, app_id, merged)?)
    }

    pub async fn delete_application(&self, af_id: &str, trans_id: &str, app_id: &str) -> Result<(), ServiceError> {
        self.registry.get_application(af_id, trans_id, app_id)?;
        self.delete_app(app_id).await?;
        self.registry.delete_application(af_id, trans_id, app_id)?;
        tracing::info!("deleted application {} from PFD transaction {}/{}", app_id, af_id, trans_id);
        Ok(())
    }

    /// Whether any transaction provisions `app_id`.
    pub fn app_id_in_use(&self, app_id: &str) -> bool {
        self.registry.app_id_in_use(app_id)
    }
}
