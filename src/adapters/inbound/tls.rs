//! TLS Listener Configuration
//!
//! Builds the rustls acceptor used by the TLS listener. Certificates come
//! from PEM files or, for lab setups, are generated on the fly.

use crate::config::Http2Config;
use anyhow::Context;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// ALPN ids offered by the TLS listener, preferred first.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// TLS listener configuration.
#[derive(Clone)]
pub struct TlsConfig {
    pub acceptor: TlsAcceptor,
}

impl TlsConfig {
    /// Build from the `http2` config section.
    pub fn from_config(cfg: &Http2Config, api_root: &str) -> anyhow::Result<Self> {
        if cfg.self_signed {
            tracing::warn!("TLS listener uses a generated self-signed certificate");
            return Self::self_signed(api_root);
        }
        Self::from_pem_files(Path::new(&cfg.server_cert), Path::new(&cfg.server_key))
    }

    /// Load TLS config from certificate and key files.
    pub fn from_pem_files(cert_path: &Path, key_path: &Path) -> anyhow::Result<Self> {
        let cert_file = File::open(cert_path)
            .with_context(|| format!("failed to open certificate {}", cert_path.display()))?;
        let key_file = File::open(key_path)
            .with_context(|| format!("failed to open private key {}", key_path.display()))?;

        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut BufReader::new(cert_file))
            .collect::<Result<Vec<_>, _>>()?;
        if certs.is_empty() {
            anyhow::bail!("no certificate found in {}", cert_path.display());
        }

        let key = rustls_pemfile::private_key(&mut BufReader::new(key_file))?
            .ok_or_else(|| anyhow::anyhow!("no private key found in {}", key_path.display()))?;

        Self::from_certs_and_key(certs, key)
    }

    /// Create TLS config from certificates and key, offering h2 and http/1.1.
    pub fn from_certs_and_key(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> anyhow::Result<Self> {
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let mut config = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        config.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

        Ok(Self {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Generate a self-signed certificate for `domain`, localhost and 127.0.0.1.
    pub fn self_signed(domain: &str) -> anyhow::Result<Self> {
        let subject_alt_names = vec![
            domain.to_string(),
            "localhost".to_string(),
            "127.0.0.1".to_string(),
        ];

        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(subject_alt_names)?;
        let cert_der = cert.der().clone();
        let key_der = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));

        Self::from_certs_and_key(vec![cert_der], key_der)
    }
}
