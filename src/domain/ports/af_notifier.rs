//! AF Notifier Port
//!
//! Delivers events to the callback URI an AF registered with its subscription.

use crate::domain::events::EventNotification;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid notification destination {0}")]
    InvalidDestination(String),

    #[error("delivery to {uri} failed: {reason}")]
    Delivery { uri: String, reason: String },

    #[error("{uri} rejected the notification with status {status}")]
    Rejected { uri: String, status: u16 },
}

/// Outbound port for AF event delivery. One attempt per call, no retry.
#[async_trait]
pub trait AfNotifier: Send + Sync {
    async fn deliver(&self, target_uri: &str, event: &EventNotification) -> Result<(), NotifyError>;
}
