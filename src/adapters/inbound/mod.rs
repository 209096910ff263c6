mod api_server;
mod tls;
mod transport_supervisor;

pub use api_server::{
    build_router, northbound_status, upf_notification_router, ApiError, ApiState, HealthResponse,
    PFD_MANAGEMENT_ROOT, TRAFFIC_INFLUENCE_ROOT,
};
pub use tls::{TlsConfig, ALPN_PROTOCOLS};
pub use transport_supervisor::{
    serve, ListenerKind, ListenerSpec, SupervisorReport, SupervisorState, TransportSupervisor,
};
