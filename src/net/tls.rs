use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use ring::digest::{digest, SHA256};
use std::path::Path;
use tracing::info;
use wtransport::Identity;

use crate::config::ServerConfig;

// Dev certificate paths (generated by scripts/gen-dev-cert)
const DEV_CERT_FILE: &str = "certs/cert.pem";
const DEV_KEY_FILE: &str = "certs/key.pem";

/// TLS identity for the WebTransport endpoint
pub struct TlsConfig {
    pub identity: Identity,
    /// Base64-encoded SHA-256 hash of the leaf certificate, for browser pinning
    pub cert_hash: String,
}

impl TlsConfig {
    /// Load the identity named by `TLS_CERT_PATH`/`TLS_KEY_PATH`, falling
    /// back to the dev certificate under `certs/`
    pub async fn load(config: &ServerConfig) -> Result<Self> {
        if let (Some(cert_path), Some(key_path)) = (&config.tls_cert_path, &config.tls_key_path) {
            info!("Loading TLS certificate from {}", cert_path);
            return Self::load_from_paths(cert_path, key_path).await;
        }

        if Path::new(DEV_CERT_FILE).exists() && Path::new(DEV_KEY_FILE).exists() {
            info!("Loading dev certificate from certs/");
            Self::load_from_paths(DEV_CERT_FILE, DEV_KEY_FILE).await
        } else {
            Err(anyhow!(
                "TLS certificate not found.\n\n\
                For development: run `cargo run --manifest-path scripts/Cargo.toml`.\n\
                For production: set TLS_CERT_PATH and TLS_KEY_PATH."
            ))
        }
    }

    async fn load_from_paths(cert_path: &str, key_path: &str) -> Result<Self> {
        let identity = Identity::load_pemfiles(cert_path, key_path)
            .await
            .with_context(|| format!("Failed to load certificate from {} / {}", cert_path, key_path))?;

        let cert_hash = Self::compute_cert_hash(&identity);
        info!("Certificate hash: {}", cert_hash);
        info!("Chrome flag: --ignore-certificate-errors-spki-list={}", cert_hash);

        Ok(Self { identity, cert_hash })
    }

    fn compute_cert_hash(identity: &Identity) -> String {
        identity
            .certificate_chain()
            .as_slice()
            .first()
            .map(|cert| STANDARD.encode(digest(&SHA256, cert.der()).as_ref()))
            .unwrap_or_default()
    }

    pub fn cert_hash(&self) -> &str {
        &self.cert_hash
    }
}
