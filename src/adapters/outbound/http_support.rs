//! Shared plumbing for the reqwest based southbound and AF clients.

use crate::domain::entities::ProblemDetails;
use crate::domain::ports::{SouthboundError, SouthboundResponse};
use crate::domain::value_objects::SouthboundTarget;
use anyhow::Context;
use std::time::Duration;

/// Upper bound on any single outbound request.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub const MERGE_PATCH_JSON: &str = "application/merge-patch+json";

/// Build a client with the gateway's timeout and user agent. `extra_root`
/// is a PEM CA bundle trusted in addition to the built-in roots.
pub fn build_http_client(user_agent: &str, extra_root: Option<&[u8]>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(user_agent.to_string());

    if let Some(pem) = extra_root {
        let cert = reqwest::Certificate::from_pem(pem).context("invalid CA certificate")?;
        builder = builder.add_root_certificate(cert);
    }

    builder.build().context("failed to build HTTP client")
}

pub fn transport_error(target: SouthboundTarget, e: reqwest::Error) -> SouthboundError {
    SouthboundError::Transport {
        target,
        reason: e.to_string(),
    }
}

/// Decode a southbound answer. Non-2xx statuses become problem details,
/// synthesized when the peer sent none.
pub async fn read_response(
    target: SouthboundTarget,
    response: reqwest::Response,
) -> Result<SouthboundResponse, SouthboundError> {
    let status = response.status().as_u16();
    let bytes = response
        .bytes()
        .await
        .map_err(|e| transport_error(target, e))?;

    if (200..300).contains(&status) {
        if bytes.is_empty() {
            return Ok(SouthboundResponse::ok(status, None));
        }
        let body = serde_json::from_slice(&bytes).map_err(|e| SouthboundError::InvalidResponse {
            target,
            reason: e.to_string(),
        })?;
        return Ok(SouthboundResponse::ok(status, Some(body)));
    }

    let problem = serde_json::from_slice::<ProblemDetails>(&bytes).unwrap_or_else(|_| {
        ProblemDetails::titled(format!("{} returned status {}", target, status)).with_status(status)
    });
    Ok(SouthboundResponse::problem(status, problem))
}
