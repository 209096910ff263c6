//! nef-gateway Library
//!
//! Traffic influence and PFD management gateway between Application
//! Functions and the 5G core.
//! Exposed as a library for integration tests.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::{EventRouter, PfdManagementService, TrafficInfluenceService};
pub use config::{load_config, Config};
pub use domain::entities::{PfdManagement, PfdTransaction, Subscription, TrafficInfluSub};
pub use domain::ports::{AfNotifier, PfdSouthbound, SouthboundClient};
pub use domain::services::{RegistryLimits, SubscriptionRegistry};
pub use infrastructure::ShutdownController;
