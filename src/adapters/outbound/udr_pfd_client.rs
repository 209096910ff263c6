//! UDR PFD Data Client
//!
//! Implements PfdSouthbound against the `Nudr_DataRepository`
//! application-data PFD resource (TS 29.519), keyed by application id.

use super::http_support::{build_http_client, read_response, transport_error};
use crate::domain::entities::PfdDataForApp;
use crate::domain::ports::{PfdSouthbound, SouthboundError, SouthboundResponse};
use crate::domain::value_objects::SouthboundTarget;
use async_trait::async_trait;

const PFD_DATA_PATH: &str = "/nudr-dr/v1/application-data/pfds";

pub struct UdrPfdHttpClient {
    client: reqwest::Client,
    pfds_url: String,
}

impl UdrPfdHttpClient {
    pub fn new(api_root: &str, user_agent: &str) -> anyhow::Result<Self> {
        Ok(Self::with_client(build_http_client(user_agent, None)?, api_root))
    }

    pub fn with_client(client: reqwest::Client, api_root: &str) -> Self {
        Self {
            client,
            pfds_url: format!("{}{}", api_root.trim_end_matches('/'), PFD_DATA_PATH),
        }
    }

    fn app_url(&self, app_id: &str) -> String {
        format!("{}/{}", self.pfds_url, app_id)
    }
}

#[async_trait]
impl PfdSouthbound for UdrPfdHttpClient {
    async fn put_app(&self, data: &PfdDataForApp) -> Result<SouthboundResponse, SouthboundError> {
        let response = self
            .client
            .put(self.app_url(&data.app_id))
            .json(data)
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        read_response(SouthboundTarget::Udr, response).await
    }

    async fn get_app(&self, app_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        let response = self
            .client
            .get(self.app_url(app_id))
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        read_response(SouthboundTarget::Udr, response).await
    }

    async fn delete_app(&self, app_id: &str) -> Result<SouthboundResponse, SouthboundError> {
        let response = self
            .client
            .delete(self.app_url(app_id))
            .send()
            .await
            .map_err(|e| transport_error(SouthboundTarget::Udr, e))?;
        read_response(SouthboundTarget::Udr, response).await
    }
}
