// Shared transport configuration for building reqwest::Client instances.
//
// The registration client rebuilds its HTTP client from this config
// whenever the trust anchor changes (`reload_certificates`), so TLS state
// is a pure function of the config plus the anchor file on disk.

use std::path::PathBuf;
use std::time::Duration;

use tokio_retry::strategy::ExponentialBackoff;
use url::Url;

use crate::certs::{Certificate, SERVER_CERT_FILE};
use crate::error::Error;

const USER_AGENT: &str = concat!("entitle/", env!("CARGO_PKG_VERSION"));

/// TLS verification mode.
#[derive(Debug, Clone)]
pub enum TlsMode {
    /// System certificate store, plus the imported trust anchor when the
    /// anchor file exists. This is the default and what
    /// `reload_certificates` re-evaluates.
    System,
    /// A specific CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate. Maps the config store's `insecure` flag.
    DangerAcceptInvalid,
}

/// Bounded retry with exponential backoff for transient network errors.
///
/// Retries never apply to HTTP status errors or TLS validation failures,
/// and never span distinct public operations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// No retries; the first failure surfaces immediately.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    /// Delay sequence: base, 2*base, 4*base, ... capped at `max_retries`
    /// extra attempts.
    pub(crate) fn backoff(&self) -> std::iter::Take<ExponentialBackoff> {
        let factor = u64::try_from(self.base_delay.as_millis()).unwrap_or(500) / 2;
        ExponentialBackoff::from_millis(2)
            .factor(factor.max(1))
            .take(self.max_retries)
    }
}

/// Transport settings shared by every request of a client instance.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    pub timeout: Duration,
    /// Explicit proxy; `None` defers to the standard proxy environment
    /// variables. Credentials may be embedded in the URL userinfo.
    pub proxy: Option<Url>,
    /// Trust-anchor file consulted in `TlsMode::System`.
    pub anchor_path: PathBuf,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::System,
            timeout: Duration::from_secs(60),
            proxy: None,
            anchor_path: PathBuf::from(SERVER_CERT_FILE),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    ///
    /// Reads the trust anchor (if any) at build time; callers re-invoke
    /// this to pick up a newly imported anchor.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .tls_info(true);

        match &self.tls {
            TlsMode::System => {
                if self.anchor_path.exists() {
                    builder = builder.add_root_certificate(read_anchor(&self.anchor_path)?);
                }
            }
            TlsMode::CustomCa(path) => {
                builder = builder.add_root_certificate(read_anchor(path)?);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        if let Some(proxy_url) = &self.proxy {
            let mut proxy = reqwest::Proxy::all(proxy_url.clone()).map_err(Error::Network)?;
            if !proxy_url.username().is_empty() {
                proxy = proxy.basic_auth(
                    proxy_url.username(),
                    proxy_url.password().unwrap_or_default(),
                );
            }
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(Error::Network)
    }
}

fn read_anchor(path: &std::path::Path) -> Result<reqwest::Certificate, Error> {
    let pem = std::fs::read(path)
        .map_err(|e| Error::InvalidCertificate(format!("cannot read {}: {e}", path.display())))?;
    reqwest::Certificate::from_pem(&pem)
        .map_err(|e| Error::InvalidCertificate(format!("{}: {e}", path.display())))
}

/// Fetch the certificate a server presents, accepting any chain.
///
/// Used to fill `SslError::peer_cert` after a validation failure so the
/// caller can fingerprint the certificate before deciding to trust it.
/// Performs a bare GET against the service root; no API path, no auth.
pub(crate) async fn probe_peer_certificate(url: &Url, timeout: Duration) -> Option<Certificate> {
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .tls_info(true)
        .build()
        .ok()?;

    let response = client.get(url.clone()).send().await.ok()?;
    let info = response.extensions().get::<reqwest::tls::TlsInfo>()?;
    info.peer_certificate()
        .map(|der| Certificate::from_der(der.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_bounded_and_doubling() {
        let policy = RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        };
        let delays: Vec<_> = policy.backoff().collect();
        assert_eq!(delays.len(), 3);
        assert_eq!(delays[0], Duration::from_millis(500));
        assert_eq!(delays[1], Duration::from_millis(1000));
        assert_eq!(delays[2], Duration::from_millis(2000));
    }

    #[test]
    fn no_retry_policy_yields_nothing() {
        assert_eq!(RetryPolicy::none().backoff().count(), 0);
    }

    #[test]
    fn system_mode_ignores_missing_anchor() {
        let config = TransportConfig {
            anchor_path: PathBuf::from("/nonexistent/anchors/registration_server.pem"),
            ..TransportConfig::default()
        };
        assert!(config.build_client().is_ok());
    }

    #[test]
    fn custom_ca_requires_readable_file() {
        let config = TransportConfig {
            tls: TlsMode::CustomCa(PathBuf::from("/nonexistent/ca.pem")),
            ..TransportConfig::default()
        };
        assert!(matches!(
            config.build_client(),
            Err(Error::InvalidCertificate(_))
        ));
    }
}
