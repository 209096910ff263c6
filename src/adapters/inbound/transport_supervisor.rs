//! Transport Supervisor
//!
//! Runs the plaintext (HTTP/1.1) and TLS (HTTP/2, HTTP/1.1 by ALPN)
//! listeners over one shared axum router, closes them together on
//! shutdown and waits for every task it spawned before reporting.
//!
//! Lifecycle: `Configuring -> Running -> Draining -> Stopped`, published on
//! a watch channel.

use super::tls::TlsConfig;
use crate::config::Config;
use crate::infrastructure::ShutdownController;
use anyhow::Context;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Configuring,
    Running,
    Draining,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerKind {
    /// Cleartext HTTP/1.1
    Plain,
    /// TLS with ALPN h2 / http/1.1
    Tls,
}

impl fmt::Display for ListenerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenerKind::Plain => write!(f, "http"),
            ListenerKind::Tls => write!(f, "https"),
        }
    }
}

/// One listener to run.
#[derive(Clone)]
pub struct ListenerSpec {
    pub kind: ListenerKind,
    pub addr: String,
    pub tls: Option<TlsConfig>,
}

impl ListenerSpec {
    pub fn plain(addr: impl Into<String>) -> Self {
        Self {
            kind: ListenerKind::Plain,
            addr: bind_address(&addr.into()),
            tls: None,
        }
    }

    pub fn tls(addr: impl Into<String>, tls: TlsConfig) -> Self {
        Self {
            kind: ListenerKind::Tls,
            addr: bind_address(&addr.into()),
            tls: Some(tls),
        }
    }
}

/// `:8091` binds every interface.
fn bind_address(endpoint: &str) -> String {
    if endpoint.starts_with(':') {
        format!("0.0.0.0{}", endpoint)
    } else {
        endpoint.to_string()
    }
}

/// Outcome of a supervisor run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub listeners_started: usize,
    /// Tasks that signalled completion: every listener plus the drain trigger
    pub completion_signals: usize,
    pub failed_listeners: Vec<String>,
}

enum Completion {
    Listener {
        kind: ListenerKind,
        addr: String,
        result: anyhow::Result<()>,
    },
    Drain,
}

pub struct TransportSupervisor {
    router: Router,
    listeners: Vec<ListenerSpec>,
    shutdown: ShutdownController,
    strict: bool,
    state: Arc<watch::Sender<SupervisorState>>,
}

impl TransportSupervisor {
    pub fn new(
        router: Router,
        listeners: Vec<ListenerSpec>,
        shutdown: ShutdownController,
        strict: bool,
    ) -> anyhow::Result<Self> {
        if listeners.is_empty() {
            anyhow::bail!("no listener configured");
        }
        let (state, _) = watch::channel(SupervisorState::Configuring);
        Ok(Self {
            router,
            listeners,
            shutdown,
            strict,
            state: Arc::new(state),
        })
    }

    /// One listener per configured endpoint.
    pub fn from_config(cfg: &Config, router: Router, shutdown: ShutdownController) -> anyhow::Result<Self> {
        let mut listeners = Vec::new();
        if !cfg.http.endpoint.is_empty() {
            listeners.push(ListenerSpec::plain(cfg.http.endpoint.as_str()));
        }
        if !cfg.http2.endpoint.is_empty() {
            let tls = TlsConfig::from_config(&cfg.http2, &cfg.api_root)
                .context("failed to load TLS material for the http2 endpoint")?;
            listeners.push(ListenerSpec::tls(cfg.http2.endpoint.as_str(), tls));
        }
        Self::new(router, listeners, shutdown, cfg.strict_listeners)
    }

    pub fn state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    /// Serve until the shutdown signal fires, or until no listener is left
    /// running. In strict mode the first listener failure closes the others
    /// and is returned once everything has stopped.
    pub async fn run(self) -> anyhow::Result<SupervisorReport> {
        let close = ShutdownController::new();
        let mut tasks: JoinSet<Completion> = JoinSet::new();

        for spec in self.listeners {
            let router = self.router.clone();
            let close = close.clone();
            tasks.spawn(async move {
                let result = run_listener(&spec, router, close).await;
                Completion::Listener {
                    kind: spec.kind,
                    addr: spec.addr,
                    result,
                }
            });
        }
        let listeners_started = tasks.len();
        self.state.send_replace(SupervisorState::Running);

        {
            let shutdown = self.shutdown.clone();
            let close = close.clone();
            let state = self.state.clone();
            tasks.spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => {}
                    _ = close.cancelled() => {}
                }
                state.send_replace(SupervisorState::Draining);
                close.shutdown();
                Completion::Drain
            });
        }

        let mut report = SupervisorReport {
            listeners_started,
            ..SupervisorReport::default()
        };
        let mut live = listeners_started;
        let mut first_failure: Option<anyhow::Error> = None;

        while let Some(joined) = tasks.join_next().await {
            report.completion_signals += 1;
            match joined {
                Ok(Completion::Drain) => {
                    tracing::debug!("drain trigger completed");
                }
                Ok(Completion::Listener { kind, addr, result }) => {
                    live -= 1;
                    match result {
                        Ok(()) => tracing::info!("{} listener {} stopped", kind, addr),
                        Err(e) => {
                            tracing::error!("{} listener {} failed: {:#}", kind, addr, e);
                            report.failed_listeners.push(addr.clone());
                            if self.strict && first_failure.is_none() {
                                first_failure = Some(e.context(format!("{} listener {}", kind, addr)));
                                close.shutdown();
                            }
                        }
                    }
                    if live == 0 {
                        close.shutdown();
                    }
                }
                Err(e) => {
                    tracing::error!("supervised task aborted: {}", e);
                    if self.strict {
                        close.shutdown();
                    }
                }
            }
        }

        self.state.send_replace(SupervisorState::Stopped);
        tracing::info!(
            "transport stopped: {} listener(s), {} completion signal(s), {} failure(s)",
            report.listeners_started,
            report.completion_signals,
            report.failed_listeners.len()
        );

        match first_failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

async fn run_listener(spec: &ListenerSpec, router: Router, close: ShutdownController) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&spec.addr)
        .await
        .with_context(|| format!("failed to bind {}", spec.addr))?;
    tracing::info!("{} listener on {}", spec.kind, listener.local_addr()?);

    let acceptor = spec.tls.as_ref().map(|t| t.acceptor.clone());
    serve(listener, acceptor, router, close).await
}

/// Accept connections on `listener` until `close` fires, then abort the
/// connections still open. With an acceptor, each connection is a TLS
/// session speaking h2 or HTTP/1.1; without one, plain HTTP/1.1.
pub async fn serve(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    router: Router,
    close: ShutdownController,
) -> anyhow::Result<()> {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = close.cancelled() => break,
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!("accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                        continue;
                    }
                };
                tracing::debug!("connection from {}", peer);
                connections.spawn(serve_connection(stream, peer, tls.clone(), router.clone()));
            }
        }
    }

    if !connections.is_empty() {
        tracing::debug!("aborting {} open connection(s)", connections.len());
    }
    connections.shutdown().await;
    Ok(())
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, tls: Option<TlsAcceptor>, router: Router) {
    let service = TowerToHyperService::new(router);

    let result = match tls {
        None => {
            hyper::server::conn::http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
                .map_err(|e| e.to_string())
        }
        Some(acceptor) => {
            let stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(e) => {
                    tracing::debug!("TLS handshake with {} failed: {}", peer, e);
                    return;
                }
            };
            auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(stream), service)
                .await
                .map_err(|e| e.to_string())
        }
    };

    if let Err(e) = result {
        tracing::debug!("connection {} ended with error: {}", peer, e);
    }
}
