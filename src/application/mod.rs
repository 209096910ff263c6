//! Application layer: the use cases the inbound adapters call into.

pub mod event_router;
pub mod pfd_management_service;
pub mod traffic_influence_service;

pub use event_router::{EventRouter, RouteError, RoutedEvent};
pub use pfd_management_service::PfdManagementService;
pub use traffic_influence_service::{ServiceError, ServiceSettings, TrafficInfluenceService};
