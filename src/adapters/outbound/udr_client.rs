//! UDR Influence Data Client
//!
//! Implements SouthboundClient against the `Nudr_DataRepository`
//! application-data influence data resource (TS 29.519). The gateway
//! chooses the influence id itself, so creation is a PUT.

use super::http_support::{build_http_client, read_response, transport_error, MERGE_PATCH_JSON};
use crate::domain::ports::{SouthboundClient, SouthboundCreated, SouthboundError, SouthboundResponse};
use crate::domain::value_objects::SouthboundTarget;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

const INFLUENCE_DATA_PATH: &str = "/nudr-dr/v1/application-data/influenceData";

pub struct UdrHttpClient {
    client: reqwest::Client,
    influence_url: String,
}

impl UdrHttpClient {
    pub fn new(api_root: &str, user_agent: &str) -> anyhow::Result<Self> {
        Ok(Self::with_client(build_http_client(user_agent, None)?, api_root))
    }

    pub fn with_client(client: reqwest::Client, api_root: &str) -> Self {
        Self {
            client,
            influence_url: format!("{}{}", api_root.trim_end_matches('/'), INFLUENCE_DATA_PATH),
        }
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.influence_url, id)
    }
}

#[async_trait]
impl SouthboundClient for UdrHttpClient {
    fn target(&self) -> SouthboundTarget {
        SouthboundTarget::Udr
    }

    async fn create(&self, resource_hint: &str, body: Value) -> Result<SouthboundCreated, SouthboundError> {
        let response = self
            .client
            .put(self.item_url(resource_hint))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        let response = read_response(SouthboundTarget::Udr, response).await?;

        Ok(SouthboundCreated {
            resource_id: resource_hint.to_string(),
            response,
        })
    }

    async fn update(&self, resource_id: &str, body: Value) -> Result<SouthboundResponse, SouthboundError> {
        let payload = serde_json::to_vec(&body).map_err(|e| SouthboundError::InvalidResponse {
            target: SouthboundTarget::Udr,
            reason: e.to_string(),
        })?;
        let response = self
            .client
            .patch(self.item_url(resource_id))
            .header(CONTENT_TYPE, MERGE_PATCH_JSON)
            .body(payload)
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        read_response(SouthboundTarget::Udr, response).await
    }

    async fn delete(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        let response = self
            .client
            .delete(self.item_url(resource_id))
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        read_response(SouthboundTarget::Udr, response).await
    }

    async fn get(&self, resource_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        let response = self
            .client
            .get(self.item_url(resource_id))
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        read_response(SouthboundTarget::Udr, response).await
    }
}
