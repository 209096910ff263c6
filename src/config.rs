use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Plaintext listener used when no config file is given.
pub const DEFAULT_HTTP_ENDPOINT: &str = "0.0.0.0:8091";

/// Plaintext HTTP/1.1 listener
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpConfig {
    pub endpoint: String,
}

/// TLS listener (HTTP/2 with HTTP/1.1 fallback)
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Http2Config {
    pub endpoint: String,
    #[serde(alias = "NefServerCert")]
    pub server_cert: String,
    #[serde(alias = "NefServerKey")]
    pub server_key: String,
    /// Generate a throwaway certificate instead of loading one (lab use)
    pub self_signed: bool,
    /// Extra CA used to verify HTTPS notification destinations of AFs
    #[serde(alias = "AfClientCert")]
    pub af_ca_cert: Option<String>,
}

impl Http2Config {
    /// The AF CA path, if one is set.
    pub fn af_ca_path(&self) -> Option<&str> {
        self.af_ca_cert.as_deref().filter(|path| !path.is_empty())
    }
}

/// Location of a southbound function. Absent means the in-process stub is used.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct SouthboundConfig {
    pub api_root: String,
}

/// Slice an AF service is served on.
///
/// Accepts either `{"sst": 1, "sd": "010203"}` or a bare SD string, which
/// is taken to be on the eMBB slice type.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "SnssaiRepr")]
pub struct Snssai {
    pub sst: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sd: Option<String>,
}

/// Slice/service type used for a bare SD string.
pub const DEFAULT_SST: u8 = 1;

#[derive(Deserialize)]
#[serde(untagged)]
enum SnssaiRepr {
    Sd(String),
    Full {
        sst: u8,
        #[serde(default)]
        sd: Option<String>,
    },
}

impl From<SnssaiRepr> for Snssai {
    fn from(repr: SnssaiRepr) -> Self {
        match repr {
            SnssaiRepr::Sd(sd) => Snssai {
                sst: DEFAULT_SST,
                sd: Some(sd).filter(|sd| !sd.is_empty()),
            },
            SnssaiRepr::Full { sst, sd } => Snssai { sst, sd },
        }
    }
}

/// Maps an AF service id to the DNN and slice it is served on.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AfServiceConfig {
    pub id: String,
    pub dnn: String,
    #[serde(default)]
    pub snssai: Option<Snssai>,
}

/// Gateway configuration.
///
/// Keys are camelCase. The key names of the NEF JSON layout (`nefAPIRoot`,
/// `maxSubSupport`, `HTTPConfig`, ...) are accepted as aliases. Unknown keys
/// are rejected.
#[derive(Debug, Deserialize, Clone)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    // Northbound identity
    #[serde(alias = "nefAPIRoot")]
    pub api_root: String,
    pub location_prefix: String,
    pub location_prefix_pfd: String,
    pub notification_path: String,
    /// Exact route for UPF notifications. Defaults to `<notificationPath>/upf`.
    #[serde(alias = "UpfNotificationResUriPath")]
    pub upf_notification_path: Option<String>,
    #[serde(alias = "UserAgent")]
    pub user_agent: String,

    // Registry limits
    #[serde(alias = "maxSubSupport")]
    pub max_subscriptions: usize,
    #[serde(alias = "maxAFSupport")]
    pub max_afs: usize,
    #[serde(alias = "subStartID")]
    pub sub_start_id: u64,
    #[serde(alias = "maxPfdTransSupport")]
    pub max_pfd_transactions: usize,
    #[serde(alias = "pfdTransStartID")]
    pub pfd_trans_start_id: u64,

    // Listeners
    #[serde(alias = "HTTPConfig")]
    pub http: HttpConfig,
    #[serde(alias = "HTTP2Config")]
    pub http2: Http2Config,
    pub strict_listeners: bool,

    // Southbound
    pub pcf: Option<SouthboundConfig>,
    pub udr: Option<SouthboundConfig>,
    #[serde(alias = "afServiceIDs")]
    pub af_services: Vec<AfServiceConfig>,

    /// Parsed but not acted on; the gateway fetches no OAuth2 tokens
    #[serde(alias = "OAuth2Support")]
    pub oauth2_support: bool,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_root: "localhost".to_string(),
            location_prefix: "/3gpp-traffic-influence/v1/".to_string(),
            location_prefix_pfd: "/3gpp-pfd-management/v1/".to_string(),
            notification_path: "/3gpp-nef/v1/notification".to_string(),
            upf_notification_path: None,
            user_agent: "NEF-GATEWAY".to_string(),
            max_subscriptions: 8,
            max_afs: 16,
            sub_start_id: 2000,
            max_pfd_transactions: 8,
            pfd_trans_start_id: 10000,
            http: HttpConfig::default(),
            http2: Http2Config::default(),
            strict_listeners: false,
            pcf: None,
            udr: None,
            af_services: Vec::new(),
            oauth2_support: false,
            debug: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("apiRoot is required")]
    MissingApiRoot,

    #[error("locationPrefix is required")]
    MissingLocationPrefix,

    #[error("notificationPath is required")]
    MissingNotificationPath,

    #[error("{0} must start with '/'")]
    InvalidPath(&'static str),

    #[error("HTTP endpoints config missing")]
    NoEndpoint,

    #[error("http2 endpoint needs serverCert and serverKey, or selfSigned")]
    MissingTlsMaterial,

    #[error("{0} must be greater than zero")]
    InvalidLimit(&'static str),
}

fn port_of(endpoint: &str) -> Option<&str> {
    endpoint
        .rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| !port.is_empty())
}

impl Config {
    /// Defaults plus a plaintext listener on [`DEFAULT_HTTP_ENDPOINT`].
    /// Used when the gateway starts without a config file.
    pub fn standalone() -> Self {
        Self {
            http: HttpConfig {
                endpoint: DEFAULT_HTTP_ENDPOINT.to_string(),
            },
            ..Self::default()
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `NEF_*` overrides. `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("NEF_HTTP_ENDPOINT") {
            self.http.endpoint = v;
        }
        if let Some(v) = lookup("NEF_HTTP2_ENDPOINT") {
            self.http2.endpoint = v;
        }
        if let Some(v) = lookup("NEF_SERVER_CERT") {
            self.http2.server_cert = v;
        }
        if let Some(v) = lookup("NEF_SERVER_KEY") {
            self.http2.server_key = v;
        }
        if let Some(v) = lookup("NEF_API_ROOT") {
            self.api_root = v;
        }
        if let Some(v) = lookup("NEF_PCF_API_ROOT") {
            self.pcf = Some(SouthboundConfig { api_root: v });
        }
        if let Some(v) = lookup("NEF_UDR_API_ROOT") {
            self.udr = Some(SouthboundConfig { api_root: v });
        }
        if let Some(v) = lookup("NEF_MAX_SUBSCRIPTIONS").and_then(|v| v.parse().ok()) {
            self.max_subscriptions = v;
        }
        if lookup("DEBUG").is_some() {
            self.debug = true;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_root.is_empty() {
            return Err(ConfigError::MissingApiRoot);
        }
        if self.location_prefix.is_empty() {
            return Err(ConfigError::MissingLocationPrefix);
        }
        if self.notification_path.is_empty() {
            return Err(ConfigError::MissingNotificationPath);
        }
        if !self.notification_path.starts_with('/') {
            return Err(ConfigError::InvalidPath("notificationPath"));
        }
        if self
            .upf_notification_path
            .as_deref()
            .is_some_and(|path| !path.is_empty() && !path.starts_with('/'))
        {
            return Err(ConfigError::InvalidPath("upfNotificationPath"));
        }
        if self.http.endpoint.is_empty() && self.http2.endpoint.is_empty() {
            return Err(ConfigError::NoEndpoint);
        }
        if !self.http2.endpoint.is_empty()
            && !self.http2.self_signed
            && (self.http2.server_cert.is_empty() || self.http2.server_key.is_empty())
        {
            return Err(ConfigError::MissingTlsMaterial);
        }
        if self.max_subscriptions == 0 {
            return Err(ConfigError::InvalidLimit("maxSubscriptions"));
        }
        if self.max_afs == 0 {
            return Err(ConfigError::InvalidLimit("maxAfs"));
        }
        if self.max_pfd_transactions == 0 {
            return Err(ConfigError::InvalidLimit("maxPfdTransactions"));
        }
        Ok(())
    }

    /// Base URL AFs and core functions use to reach this gateway.
    /// The TLS listener wins when both are configured.
    pub fn public_base_url(&self) -> String {
        let (scheme, endpoint) = if !self.http2.endpoint.is_empty() {
            ("https", self.http2.endpoint.as_str())
        } else {
            ("http", self.http.endpoint.as_str())
        };

        match port_of(endpoint) {
            Some(port) => format!("{}://{}:{}", scheme, self.api_root, port),
            None => format!("{}://{}", scheme, self.api_root),
        }
    }

    /// Prefix for subscription Location URIs, ending in `/`.
    pub fn location_url_prefix(&self) -> String {
        format!("{}{}", self.public_base_url(), self.location_prefix)
    }

    /// Prefix for PFD transaction Location URIs, ending in `/`.
    pub fn pfd_location_url_prefix(&self) -> String {
        format!("{}{}", self.public_base_url(), self.location_prefix_pfd)
    }

    /// Path the core network posts UPF notifications to.
    pub fn upf_notification_route(&self) -> String {
        match self.custom_upf_notification_path() {
            Some(path) => path.to_string(),
            None => format!("{}/upf", self.notification_path.trim_end_matches('/')),
        }
    }

    /// The configured UPF notification path when it differs from the
    /// `<notificationPath>/{kind}` routes.
    pub fn custom_upf_notification_path(&self) -> Option<&str> {
        let default = format!("{}/upf", self.notification_path.trim_end_matches('/'));
        self.upf_notification_path
            .as_deref()
            .filter(|path| !path.is_empty() && *path != default)
    }

    /// Callback URI handed to the PCF and UDR for user plane notifications.
    pub fn upf_notification_uri(&self) -> String {
        format!("{}{}", self.public_base_url(), self.upf_notification_route())
    }

    /// Log the effective configuration at startup.
    pub fn log_summary(&self) {
        tracing::info!("api root: {}", self.api_root);
        tracing::info!("location prefix: {}", self.location_url_prefix());
        tracing::info!("pfd location prefix: {}", self.pfd_location_url_prefix());
        tracing::info!("notification uri: {}", self.upf_notification_uri());
        tracing::info!(
            "limits: max_subscriptions={} max_afs={} sub_start_id={}",
            self.max_subscriptions,
            self.max_afs,
            self.sub_start_id
        );
        tracing::info!(
            "pfd limits: max_transactions={} trans_start_id={}",
            self.max_pfd_transactions,
            self.pfd_trans_start_id
        );
        tracing::info!(
            "http endpoint: {}",
            if self.http.endpoint.is_empty() { "-" } else { self.http.endpoint.as_str() }
        );
        tracing::info!(
            "http2 endpoint: {} (self_signed={})",
            if self.http2.endpoint.is_empty() { "-" } else { self.http2.endpoint.as_str() },
            self.http2.self_signed
        );
        tracing::info!(
            "pcf: {}",
            self.pcf.as_ref().map(|c| c.api_root.as_str()).unwrap_or("stub")
        );
        tracing::info!(
            "udr: {}",
            self.udr.as_ref().map(|c| c.api_root.as_str()).unwrap_or("stub")
        );
        for svc in &self.af_services {
            tracing::info!("af service {} -> dnn {} snssai {:?}", svc.id, svc.dnn, svc.snssai);
        }
        if self.oauth2_support {
            tracing::warn!("OAuth2Support is set but OAuth2 tokens are not supported, ignoring");
        }
    }
}

pub fn load_config() -> anyhow::Result<Config> {
    let mut cfg = match std::env::var("NEF_CONFIG_PATH") {
        Ok(path) => Config::from_file(path)?,
        Err(_) => Config::standalone(),
    };

    cfg.apply_overrides(|key| std::env::var(key).ok());
    cfg.validate()?;

    Ok(cfg)
}
