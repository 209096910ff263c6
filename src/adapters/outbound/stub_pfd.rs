//! In-process PFD store
//!
//! Implements PfdSouthbound with a DashMap for runs without a UDR.

use crate::domain::entities::{PfdDataForApp, ProblemDetails};
use crate::domain::ports::{PfdSouthbound, SouthboundError, SouthboundResponse};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

#[derive(Default)]
pub struct StubPfdClient {
    apps: DashMap<String, PfdDataForApp>,
}

impl StubPfdClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stored PFDs of `app_id`.
    pub fn app(&self, app_id: &str) -> Option<PfdDataForApp> {
        self.apps.get(app_id).map(|stored| stored.value().clone())
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

fn not_found(app_id: &str) -> SouthboundResponse {
    SouthboundResponse::problem(
        404,
        ProblemDetails::titled(format!("PFD data of application {} not found", app_id)).with_status(404),
    )
}

fn to_body(data: &PfdDataForApp) -> Option<Value> {
    serde_json::to_value(data).ok()
}

#[async_trait]
impl PfdSouthbound for StubPfdClient {
    async fn put_app(&self, data: &PfdDataForApp) -> Result<SouthboundResponse, SouthboundError> {
        let status = match self.apps.insert(data.app_id.clone(), data.clone()) {
            Some(_) => 200,
            None => 201,
        };
        tracing::debug!("stub UDR stored PFDs of {}", data.app_id);
        Ok(SouthboundResponse::ok(status, to_body(data)))
    }

    async fn get_app(&self, app_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        match self.apps.get(app_id) {
            Some(stored) => Ok(SouthboundResponse::ok(200, to_body(stored.value()))),
            None => Ok(not_found(app_id)),
        }
    }

    async fn delete_app(&self, app_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        match self.apps.remove(app_id) {
            Some(_) => Ok(SouthboundResponse::ok(204, None)),
            None => Ok(not_found(app_id)),
        }
    }
}
