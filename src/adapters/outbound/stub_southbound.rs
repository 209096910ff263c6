//! In-process Southbound Stub
//!
//! Implements SouthboundClient with a DashMap so the gateway can run
//! without a PCF or UDR (lab setups, tests). Behaves like a permissive peer.

use crate::domain::entities::ProblemDetails;
use crate::domain::ports::{SouthboundClient, SouthboundCreated, SouthboundError, SouthboundResponse};
use crate::domain::value_objects::SouthboundTarget;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

pub struct StubSouthboundClient {
    target: SouthboundTarget,
    resources: Arc<DashMap<String, Value>>,
}

impl StubSouthboundClient {
    pub fn new(target: SouthboundTarget) -> Self {
        Self {
            target,
            resources: Arc::new(DashMap::new()),
        }
    }

    /// Number of resources currently held.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn not_found(&self, id: &str) -> SouthboundResponse {
        SouthboundResponse::problem(
            404,
            ProblemDetails::titled(format!("{} resource {} not found", self.target, id)).with_status(404),
        )
    }
}

/// Shallow JSON merge patch.
fn merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(changes)) => {
            for (key, value) in changes {
                if value.is_null() {
                    existing.remove(&key);
                } else {
                    existing.insert(key, value);
                }
            }
        }
        (slot, replacement) => *slot = replacement,
    }
}

#[async_trait]
impl SouthboundClient for StubSouthboundClient {
    fn target(&self) -> SouthboundTarget {
        self.target
    }

    async fn create(&self, resource_hint: &str, body: Value) -> Result<SouthboundCreated, SouthboundError> {
        // The PCF assigns its own session ids; the UDR takes the caller's
        let resource_id = match self.target {
            SouthboundTarget::Pcf => uuid::Uuid::new_v4().to_string(),
            SouthboundTarget::Udr => resource_hint.to_string(),
        };
        self.resources.insert(resource_id.clone(), body.clone());
        tracing::debug!("stub {} created {}", self.target, resource_id);

        Ok(SouthboundCreated {
            resource_id,
            response: SouthboundResponse::ok(201, Some(body)),
        })
    }

    async fn update(&self, resource_id: &str, body: Value) -> Result<SouthboundResponse, SouthboundError> {
        match self.resources.get_mut(resource_id) {
            Some(mut stored) => {
                merge(stored.value_mut(), body);
                Ok(SouthboundResponse::ok(200, Some(stored.value().clone())))
            }
            None => Ok(self.not_found(resource_id)),
        }
    }

    async fn delete(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        match self.resources.remove(resource_id) {
            Some(_) => Ok(SouthboundResponse::ok(204, None)),
            None => Ok(self.not_found(resource_id)),
        }
    }

    async fn get(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        match self.resources.get(resource_id) {
            Some(stored) => Ok(SouthboundResponse::ok(200, Some(stored.value().clone()))),
            None => Ok(self.not_found(resource_id)),
        }
    }
}
