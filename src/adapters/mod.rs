//! Adapters Layer
//!
//! Inbound: northbound HTTP API and the listeners serving it.
//! Outbound: PCF/UDR clients and the AF notification sender.

pub mod inbound;
pub mod outbound;
