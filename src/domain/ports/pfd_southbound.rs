//! PFD Southbound Port
//!
//! The UDR keeps the PFDs of each application for the SMF and UPF to fetch.
//! One record per external application id.

use super::southbound_client::{SouthboundError, SouthboundResponse};
use crate::domain::entities::PfdDataForApp;
use async_trait::async_trait;

/// Client for the UDR PFD data resource.
///
/// Same contract as [`super::SouthboundClient`]: non-2xx answers come back
/// as `Ok` with problem details.
#[async_trait]
pub trait PfdSouthbound: Send + Sync {
    /// Create or replace the PFDs of `data.app_id`.
    async fn put_app(&self, data: &PfdDataForApp) -> Result<SouthboundResponse, SouthboundError>;

    async fn get_app(&self, app_id: &str) -> Result<SouthboundResponse, SouthboundError>;

    async fn delete_app(&self, app_id: &str) -> Result<SouthboundResponse, SouthboundError>;
}
