//! nef-gateway - Traffic Influence and PFD Management Gateway
//!
//! This is the composition root that wires together all the components.

use anyhow::Context;
use nef_gateway::adapters::inbound::{build_router, upf_notification_router, ApiState, TransportSupervisor};
use nef_gateway::adapters::outbound::{pfd_southbound, southbound_client, AfNotificationClient};
use nef_gateway::application::{EventRouter, PfdManagementService, ServiceSettings, TrafficInfluenceService};
use nef_gateway::config::load_config;
use nef_gateway::domain::services::{RegistryLimits, SubscriptionRegistry};
use nef_gateway::domain::value_objects::SouthboundTarget;
use nef_gateway::infrastructure::{shutdown_signal, ShutdownController};
use std::sync::Arc;
use tracing_subscriber::fmt::format::FmtSpan;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from file and environment
    let cfg = load_config()?;

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    tracing::info!("starting nef-gateway {}", env!("CARGO_PKG_VERSION"));
    cfg.log_summary();

    // ===== COMPOSITION ROOT =====

    // 1. Registry
    let registry = Arc::new(
        SubscriptionRegistry::new(
            RegistryLimits {
                sub_start_id: cfg.sub_start_id,
                max_subscriptions: cfg.max_subscriptions,
                max_afs: cfg.max_afs,
                max_pfd_transactions: cfg.max_pfd_transactions,
                pfd_trans_start_id: cfg.pfd_trans_start_id,
            },
            cfg.location_url_prefix(),
        )
        .with_pfd_location_prefix(cfg.pfd_location_url_prefix()),
    );

    // 2. Outbound adapters
    let pcf = southbound_client(SouthboundTarget::Pcf, cfg.pcf.as_ref(), &cfg.user_agent)?;
    let udr = southbound_client(SouthboundTarget::Udr, cfg.udr.as_ref(), &cfg.user_agent)?;
    let udr_pfd = pfd_southbound(cfg.udr.as_ref(), &cfg.user_agent)?;

    let af_ca = match cfg.http2.af_ca_path() {
        Some(path) => Some(
            std::fs::read(path).with_context(|| format!("failed to read AF CA certificate {}", path))?,
        ),
        None => None,
    };
    let notifier = Arc::new(AfNotificationClient::new(&cfg.user_agent, af_ca.as_deref())?);

    // 3. Application services
    let service = Arc::new(TrafficInfluenceService::new(
        registry.clone(),
        pcf,
        udr,
        ServiceSettings {
            notification_uri: cfg.upf_notification_uri(),
            af_services: cfg.af_services.clone(),
        },
    ));
    let pfd = Arc::new(PfdManagementService::new(registry.clone(), udr_pfd));
    let events = Arc::new(EventRouter::new(registry.clone(), notifier));

    // 4. Inbound adapters and run
    let state = ApiState::new(service, pfd, events);
    let mut router = build_router(state.clone(), &cfg.notification_path);
    if let Some(path) = cfg.custom_upf_notification_path() {
        tracing::info!("UPF notifications also accepted on {}", path);
        router = router.merge(upf_notification_router(state, path));
    }

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let supervisor = TransportSupervisor::from_config(&cfg, router, shutdown)?;
    let report = supervisor.run().await?;

    tracing::info!(
        "nef-gateway stopped ({} listener(s), {} completion signal(s))",
        report.listeners_started,
        report.completion_signals
    );
    registry.log_state();

    Ok(())
}
