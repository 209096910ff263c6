mod af_notification_client;
mod http_support;
mod pcf_client;
mod stub_pfd;
mod stub_southbound;
mod udr_client;
mod udr_pfd_client;

pub use af_notification_client::AfNotificationClient;
pub use http_support::REQUEST_TIMEOUT;
pub use pcf_client::PcfHttpClient;
pub use stub_pfd::StubPfdClient;
pub use stub_southbound::StubSouthboundClient;
pub use udr_client::UdrHttpClient;
pub use udr_pfd_client::UdrPfdHttpClient;

use crate::config::SouthboundConfig;
use crate::domain::ports::{PfdSouthbound, SouthboundClient};
use crate::domain::value_objects::SouthboundTarget;
use std::sync::Arc;

/// Pick the southbound implementation for `target`: HTTP when an API root
/// is configured, the in-process stub otherwise.
pub fn southbound_client(
    target: SouthboundTarget,
    config: Option<&SouthboundConfig>,
    user_agent: &str,
) -> anyhow::Result<Arc<dyn SouthboundClient>> {
    let api_root = config
        .map(|c| c.api_root.as_str())
        .filter(|root| !root.is_empty());

    let client: Arc<dyn SouthboundClient> = match (target, api_root) {
        (SouthboundTarget::Pcf, Some(root)) => {
            tracing::info!("PCF client -> {}", root);
            Arc::new(PcfHttpClient::new(root, user_agent)?)
        }
        (SouthboundTarget::Udr, Some(root)) => {
            tracing::info!("UDR client -> {}", root);
            Arc::new(UdrHttpClient::new(root, user_agent)?)
        }
        (target, None) => {
            tracing::info!("{} not configured, using in-process stub", target);
            Arc::new(StubSouthboundClient::new(target))
        }
    };
    Ok(client)
}

/// PFD store: the UDR over HTTP when configured, the in-process stub otherwise.
pub fn pfd_southbound(
    config: Option<&SouthboundConfig>,
    user_agent: &str,
) -> anyhow::Result<Arc<dyn PfdSouthbound>> {
    let api_root = config
        .map(|c| c.api_root.as_str())
        .filter(|root| !root.is_empty());

    let client: Arc<dyn PfdSouthbound> = match api_root {
        Some(root) => {
            tracing::info!("UDR PFD client -> {}", root);
            Arc::new(UdrPfdHttpClient::new(root, user_agent)?)
        }
        None => {
            tracing::info!("UDR not configured, PFDs kept in-process");
            Arc::new(StubPfdClient::new())
        }
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_southbound_client_selection() {
        let stub = southbound_client(SouthboundTarget::Pcf, None, "NEF").unwrap();
        assert_eq!(stub.target(), SouthboundTarget::Pcf);

        let empty = SouthboundConfig {
            api_root: String::new(),
        };
        let stub = southbound_client(SouthboundTarget::Udr, Some(&empty), "NEF").unwrap();
        assert_eq!(stub.target(), SouthboundTarget::Udr);

        let http = SouthboundConfig {
            api_root: "http://udr:29504".to_string(),
        };
        let client = southbound_client(SouthboundTarget::Udr, Some(&http), "NEF").unwrap();
        assert_eq!(client.target(), SouthboundTarget::Udr);
    }

    #[tokio::test]
    async fn test_pfd_southbound_defaults_to_stub() {
        let stub = pfd_southbound(None, "NEF").unwrap();
        let missing = stub.get_app("app-1").await.unwrap();
        assert_eq!(missing.status, 404);

        let http = SouthboundConfig {
            api_root: "http://udr:29504".to_string(),
        };
        assert!(pfd_southbound(Some(&http), "NEF").is_ok());
    }
}
