//! Southbound Client Port
//!
//! Defines the interface to the core network functions that hold the
//! policy derived from a subscription: PCF app sessions and UDR influence data.
//! Implementations may speak HTTP to a real function or answer in-process.

use crate::domain::entities::ProblemDetails;
use crate::domain::value_objects::SouthboundTarget;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Outcome of one southbound operation that reached the peer.
#[derive(Debug, Clone, PartialEq)]
pub struct SouthboundResponse {
    pub status: u16,
    /// Decoded body on success
    pub body: Option<Value>,
    /// Problem details on failure
    pub problem: Option<ProblemDetails>,
}

impl SouthboundResponse {
    pub fn ok(status: u16, body: Option<Value>) -> Self {
        Self {
            status,
            body,
            problem: None,
        }
    }

    pub fn problem(status: u16, problem: ProblemDetails) -> Self {
        Self {
            status,
            body: None,
            problem: Some(problem),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Problem details to forward to the AF, synthesizing one if the peer sent none.
    pub fn problem_or_default(&self) -> ProblemDetails {
        self.problem.clone().unwrap_or_else(|| {
            ProblemDetails::titled(format!("southbound request failed with status {}", self.status))
                .with_status(self.status)
        })
    }
}

/// Result of a create: the id the peer assigned plus its response.
#[derive(Debug, Clone, PartialEq)]
pub struct SouthboundCreated {
    pub resource_id: String,
    pub response: SouthboundResponse,
}

/// The peer could not be reached or answered something unusable.
#[derive(Debug, Error)]
pub enum SouthboundError {
    #[error("{target} request failed: {reason}")]
    Transport {
        target: SouthboundTarget,
        reason: String,
    },

    #[error("{target} returned an unusable response: {reason}")]
    InvalidResponse {
        target: SouthboundTarget,
        reason: String,
    },
}

/// Client for one southbound function.
///
/// Non-2xx answers are returned as `Ok(SouthboundResponse)` carrying
/// problem details; `Err` is reserved for transport failures.
#[async_trait]
pub trait SouthboundClient: Send + Sync {
    /// Which function this client talks to.
    fn target(&self) -> SouthboundTarget;

    /// Create the derived resource. `resource_hint` is used as the id by
    /// functions that let the caller choose it (UDR).
    async fn create(&self, resource_hint: &str, body: Value) -> Result<SouthboundCreated, SouthboundError>;

    async fn update(&self, resource_id: &str, body: Value) -> Result<SouthboundResponse, SouthboundError>;

    async fn delete(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError>;

    async fn get(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError>;
}
