//! Event Router
//!
//! Matches core network notifications to the subscription that asked for
//! them and hands the translated event to the AF notifier. Delivery runs
//! on its own task so the SMF gets its answer without waiting on the AF.

use crate::domain::errors::RegistryError;
use crate::domain::events::{EventNotification, NsmfEventExposureNotification};
use crate::domain::ports::AfNotifier;
use crate::domain::services::SubscriptionRegistry;
use crate::domain::value_objects::NotificationKind;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("notification has no notifId")]
    MissingCorrelationId,

    #[error("notification has no eventNotifs")]
    NoEvents,

    #[error("no {0} event in notification")]
    TriggerNotFound(&'static str),

    #[error("no subscription for correlation id {0}")]
    NoMatch(String),
}

/// A notification that matched a subscription.
#[derive(Debug)]
pub struct RoutedEvent {
    pub af_id: String,
    pub subscription_id: String,
    pub destination: String,
    /// Detached delivery task. Dropping the handle does not cancel it.
    pub delivery: JoinHandle<()>,
}

pub struct EventRouter {
    registry: Arc<SubscriptionRegistry>,
    notifier: Arc<dyn AfNotifier>,
}

impl EventRouter {
    pub fn new(registry: Arc<SubscriptionRegistry>, notifier: Arc<dyn AfNotifier>) -> Self {
        Self { registry, notifier }
    }

    /// Route one notification. Must be called inside a tokio runtime.
    pub fn route(
        &self,
        kind: NotificationKind,
        notification: NsmfEventExposureNotification,
    ) -> Result<RoutedEvent, RouteError> {
        if notification.notif_id.is_empty() {
            return Err(RouteError::MissingCorrelationId);
        }
        if notification.event_notifs.is_empty() {
            return Err(RouteError::NoEvents);
        }

        let record = notification
            .find_event(kind.trigger_event())
            .ok_or(RouteError::TriggerNotFound(kind.trigger_event()))?;

        let subscription = self
            .registry
            .find_by_correlation(&notification.notif_id)
            .map_err(|e| match e {
                RegistryError::CorrelationNotFound(corr) => RouteError::NoMatch(corr),
                other => RouteError::NoMatch(other.to_string()),
            })?;

        let event = EventNotification::from_record(
            subscription.payload.af_trans_id.clone(),
            kind.subscribed_event(),
            record,
        );
        let destination = subscription
            .payload
            .notification_destination
            .clone()
            .unwrap_or_default();

        tracing::info!(
            "routing {} for {}/{} to {}",
            kind.trigger_event(),
            subscription.af_id,
            subscription.id,
            destination
        );

        let notifier = Arc::clone(&self.notifier);
        let target = destination.clone();
        let delivery = tokio::spawn(async move {
            match notifier.deliver(&target, &event).await {
                Ok(()) => tracing::debug!("delivered notification to {}", target),
                Err(e) => tracing::error!("AF notification failed: {}", e),
            }
        });

        Ok(RoutedEvent {
            af_id: subscription.af_id,
            subscription_id: subscription.id,
            destination,
            delivery,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::entities::TrafficInfluSub;
    use crate::domain::events::EventNotificationRecord;
    use crate::domain::ports::NotifyError;
    use crate::domain::services::RegistryLimits;
    use async_trait::async_trait;
    use std::sync::Mutex;

    // ===== Mock Implementations =====

    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<(String, EventNotification)>>,
        fail: bool,
    }

    #[async_trait]
    impl AfNotifier for RecordingNotifier {
        async fn deliver(&self, target_uri: &str, event: &EventNotification) -> Result<(), NotifyError> {
            self.delivered
                .lock()
                .unwrap()
                .push((target_uri.to_string(), event.clone()));
            if self.fail {
                return Err(NotifyError::Delivery {
                    uri: target_uri.to_string(),
                    reason: "timeout".to_string(),
                });
            }
            Ok(())
        }
    }

    // ===== Test Helpers =====

    fn setup(fail: bool) -> (EventRouter, Arc<RecordingNotifier>, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::new(
            RegistryLimits::default(),
            "http://nef/3gpp-traffic-influence/v1/",
        ));
        let notifier = Arc::new(RecordingNotifier {
            fail,
            ..RecordingNotifier::default()
        });
        let router = EventRouter::new(registry.clone(), notifier.clone());

        let payload = TrafficInfluSub {
            af_trans_id: Some("trans-1".to_string()),
            notification_destination: Some("http://af:8050/notify".to_string()),
            ..TrafficInfluSub::default()
        };
        registry
            .add_subscription("AF_01", payload, Some("corr-1".to_string()))
            .unwrap();

        (router, notifier, registry)
    }

    fn notification(notif_id: &str, events: &[&str]) -> NsmfEventExposureNotification {
        NsmfEventExposureNotification {
            notif_id: notif_id.to_string(),
            event_notifs: events
                .iter()
                .map(|event| EventNotificationRecord {
                    event: event.to_string(),
                    dnai_chg_type: Some("EARLY".to_string()),
                    target_dnai: Some("edge-2".to_string()),
                    ..EventNotificationRecord::default()
                })
                .collect(),
        }
    }

    // ===== Routing Tests =====

    #[tokio::test]
    async fn test_matching_notification_is_delivered_once() {
        let (router, notifier, _registry) = setup(false);

        let routed = router
            .route(NotificationKind::UpPathChange, notification("corr-1", &["UP_PATH_CH"]))
            .unwrap();
        assert_eq!(routed.af_id, "AF_01");
        assert_eq!(routed.subscription_id, "2000");
        assert_eq!(routed.destination, "http://af:8050/notify");
        routed.delivery.await.unwrap();

        let delivered = notifier.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        let (uri, event) = &delivered[0];
        assert_eq!(uri, "http://af:8050/notify");
        assert_eq!(event.af_trans_id.as_deref(), Some("trans-1"));
        assert_eq!(event.subscribed_event, "UP_PATH_CHANGE");
        assert_eq!(event.dnai_chg_type.as_deref(), Some("EARLY"));
        assert_eq!(event.target_dnai.as_deref(), Some("edge-2"));
    }

    #[tokio::test]
    async fn test_trigger_found_among_other_events() {
        let (router, notifier, _registry) = setup(false);

        let routed = router
            .route(
                NotificationKind::UpPathChange,
                notification("corr-1", &["QOS_MON", "UP_PATH_CH"]),
            )
            .unwrap();
        routed.delivery.await.unwrap();

        assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_correlation_is_not_delivered() {
        let (router, notifier, _registry) = setup(false);

        let err = router
            .route(NotificationKind::UpPathChange, notification("corr-unknown", &["UP_PATH_CH"]))
            .unwrap_err();

        assert!(matches!(err, RouteError::NoMatch(ref corr) if corr == "corr-unknown"));
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_notif_id() {
        let (router, _notifier, _registry) = setup(false);
        let err = router
            .route(NotificationKind::UpPathChange, notification("", &["UP_PATH_CH"]))
            .unwrap_err();
        assert!(matches!(err, RouteError::MissingCorrelationId));
    }

    #[tokio::test]
    async fn test_empty_event_list() {
        let (router, _notifier, _registry) = setup(false);
        let err = router
            .route(NotificationKind::UpPathChange, notification("corr-1", &[]))
            .unwrap_err();
        assert!(matches!(err, RouteError::NoEvents));
    }

    #[tokio::test]
    async fn test_no_trigger_event() {
        let (router, notifier, _registry) = setup(false);
        let err = router
            .route(NotificationKind::UpPathChange, notification("corr-1", &["QOS_MON"]))
            .unwrap_err();
        assert!(matches!(err, RouteError::TriggerNotFound("UP_PATH_CH")));
        assert!(notifier.delivered.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_does_not_fail_routing() {
        let (router, notifier, _registry) = setup(true);

        let routed = router
            .route(NotificationKind::UpPathChange, notification("corr-1", &["UP_PATH_CH"]))
            .unwrap();
        routed.delivery.await.unwrap();

        assert_eq!(notifier.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_subscription_no_longer_matches() {
        let (router, _notifier, registry) = setup(false);
        registry.delete_subscription("AF_01", "2000").unwrap();

        let err = router
            .route(NotificationKind::UpPathChange, notification("corr-1", &["UP_PATH_CH"]))
            .unwrap_err();
        assert!(matches!(err, RouteError::NoMatch(_)));
    }
}
