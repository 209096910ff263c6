//! AF Notification Client
//!
//! Implements AfNotifier by POSTing the event as JSON to the AF's
//! notification destination. One attempt, bounded by the client timeout.

use super::http_support::build_http_client;
use crate::domain::events::EventNotification;
use crate::domain::ports::{AfNotifier, NotifyError};
use async_trait::async_trait;

pub struct AfNotificationClient {
    client: reqwest::Client,
}

impl AfNotificationClient {
    /// `ca_pem` is an optional CA bundle for AFs behind private certificates.
    pub fn new(user_agent: &str, ca_pem: Option<&[u8]>) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_http_client(user_agent, ca_pem)?,
        })
    }
}

#[async_trait]
impl AfNotifier for AfNotificationClient {
    async fn deliver(&self, target_uri: &str, event: &EventNotification) -> Result<(), NotifyError> {
        let url = reqwest::Url::parse(target_uri)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
            .ok_or_else(|| NotifyError::InvalidDestination(target_uri.to_string()))?;

        let response = self
            .client
            .post(url)
            .json(event)
            .send()
            .await
            .map_err(|e| NotifyError::Delivery {
                uri: target_uri.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                uri: target_uri.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::debug!("AF at {} accepted notification ({})", target_uri, status);
        Ok(())
    }
}
