//! PCF Policy Authorization Client
//!
//! Implements SouthboundClient against `Npcf_PolicyAuthorization`
//! (TS 29.514) app sessions over HTTP.

use super::http_support::{build_http_client, read_response, transport_error, MERGE_PATCH_JSON};
use crate::domain::ports::{SouthboundClient, SouthboundCreated, SouthboundError, SouthboundResponse};
use crate::domain::value_objects::SouthboundTarget;
use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use serde_json::Value;

const APP_SESSIONS_PATH: &str = "/npcf-policyauthorization/v1/app-sessions";

pub struct PcfHttpClient {
    client: reqwest::Client,
    sessions_url: String,
}

impl PcfHttpClient {
    /// `api_root` is the PCF's scheme and authority, e.g. `http://pcf:29507`.
    pub fn new(api_root: &str, user_agent: &str) -> anyhow::Result<Self> {
        Ok(Self::with_client(build_http_client(user_agent, None)?, api_root))
    }

    pub fn with_client(client: reqwest::Client, api_root: &str) -> Self {
        Self {
            client,
            sessions_url: format!("{}{}", api_root.trim_end_matches('/'), APP_SESSIONS_PATH),
        }
    }

    fn session_url(&self, id: &str) -> String {
        format!("{}/{}", self.sessions_url, id)
    }
}

/// App session id is the last segment of the Location header.
fn session_id_from_location(location: &str) -> Option<String> {
    location
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl SouthboundClient for PcfHttpClient {
    fn target(&self) -> SouthboundTarget {
        SouthboundTarget::Pcf
    }

    async fn create(&self, _resource_hint: &str, body: Value) -> Result<SouthboundCreated, SouthboundError> {
        let response = self
            .client
            .post(&self.sessions_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Pcf, e))?;

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(session_id_from_location);
        let response = read_response(SouthboundTarget::Pcf, response).await?;

        if !response.is_success() {
            return Ok(SouthboundCreated {
                resource_id: String::new(),
                response,
            });
        }

        let resource_id = location.ok_or_else(|| SouthboundError::InvalidResponse {
            target: SouthboundTarget::Pcf,
            reason: "app session created without Location header".to_string(),
        })?;
        tracing::debug!("PCF app session {} created", resource_id);

        Ok(SouthboundCreated {
            resource_id,
            response,
        })
    }

    async fn update(&self, resource_id: &str, body: Value) -> Result<SouthboundResponse, SouthboundError> {
        let payload = serde_json::to_vec(&body).map_err(|e| SouthboundError::InvalidResponse {
            target: SouthboundTarget::Pcf,
            reason: e.to_string(),
        })?;
        let response = self
            .client
            .patch(self.session_url(resource_id))
            .header(CONTENT_TYPE, MERGE_PATCH_JSON)
            .body(payload)
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Pcf, e))?;
        read_response(SouthboundTarget::Pcf, response).await
    }

    async fn delete(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        // App sessions are deleted through a custom POST operation
        let response = self
            .client
            .post(format!("{}/delete", self.session_url(resource_id)))
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Pcf, e))?;
        read_response(SouthboundTarget::Pcf, response).await
    }

    async fn get(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        let response = self
            .client
            .get(self.session_url(resource_id))
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Pcf, e))?;
        read_response(SouthboundTarget::Pcf, response).await
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_session_id_from_location() {
        assert_eq!(
            session_id_from_location("http://pcf/npcf-policyauthorization/v1/app-sessions/abc-1"),
            Some("abc-1".to_string())
        );
        assert_eq!(session_id_from_location("abc-2/"), Some("abc-2".to_string()));
        assert_eq!(session_id_from_location(""), None);
    }

    // ===== Integration Tests with Mock HTTP Server =====

    #[tokio::test]
    async fn test_create_reads_session_id_from_location() {
        let mock_server = MockServer::start().await;
        let body = json!({"ascReqData": {"afAppId": "app001"}});

        Mock::given(method("POST"))
            .and(path("/npcf-policyauthorization/v1/app-sessions"))
            .and(body_json(&body))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header(
                        "Location",
                        format!("{}/npcf-policyauthorization/v1/app-sessions/sess-42", mock_server.uri()),
                    )
                    .set_body_json(&body),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PcfHttpClient::new(&mock_server.uri(), "NEF-GATEWAY").unwrap();
        let created = client.create("ignored", body.clone()).await.unwrap();

        assert_eq!(created.resource_id, "sess-42");
        assert_eq!(created.response.status, 201);
        assert_eq!(created.response.body, Some(body));
    }

    #[tokio::test]
    async fn test_create_without_location_is_invalid() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&mock_server)
            .await;

        let client = PcfHttpClient::new(&mock_server.uri(), "NEF-GATEWAY").unwrap();
        let err = client.create("ignored", json!({})).await.unwrap_err();
        assert!(matches!(err, SouthboundError::InvalidResponse { .. }));
    }

    #[tokio::test]
    async fn test_create_rejected_carries_problem() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(403).set_body_json(json!({"title": "Forbidden", "status": 403})),
            )
            .mount(&mock_server)
            .await;

        let client = PcfHttpClient::new(&mock_server.uri(), "NEF-GATEWAY").unwrap();
        let created = client.create("ignored", json!({})).await.unwrap();

        assert!(!created.response.is_success());
        assert_eq!(created.response.status, 403);
        assert_eq!(
            created.response.problem.unwrap().title.as_deref(),
            Some("Forbidden")
        );
    }

    #[tokio::test]
    async fn test_update_uses_merge_patch() {
        let mock_server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/npcf-policyauthorization/v1/app-sessions/sess-42"))
            .and(header("content-type", MERGE_PATCH_JSON))
            .and(header("user-agent", "NEF-GATEWAY"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PcfHttpClient::new(&mock_server.uri(), "NEF-GATEWAY").unwrap();
        let response = client
            .update("sess-42", json!({"afRoutReq": {"appReloc": true}}))
            .await
            .unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_none());
    }

    #[tokio::test]
    async fn test_delete_posts_to_delete_operation() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/npcf-policyauthorization/v1/app-sessions/sess-42/delete"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = PcfHttpClient::new(&mock_server.uri(), "NEF-GATEWAY").unwrap();
        assert!(client.delete("sess-42").await.unwrap().is_success());
    }

    #[tokio::test]
    async fn test_get_unknown_session() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/npcf-policyauthorization/v1/app-sessions/nope"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = PcfHttpClient::new(&mock_server.uri(), "NEF-GATEWAY").unwrap();
        let response = client.get("nope").await.unwrap();
        assert_eq!(response.status, 404);
        assert_eq!(response.problem.unwrap().status, Some(404));
    }

    #[tokio::test]
    async fn test_unreachable_pcf_is_transport_error() {
        let client = PcfHttpClient::new("http://127.0.0.1:1", "NEF-GATEWAY").unwrap();
        let err = client.get("sess-1").await.unwrap_err();
        assert!(matches!(
            err,
            SouthboundError::Transport {
                target: SouthboundTarget::Pcf,
                ..
            }
        ));
    }
}
