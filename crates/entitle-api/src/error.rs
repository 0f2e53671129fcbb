use thiserror::Error;

/// Top-level error type for the `entitle-api` crate.
///
/// Covers every failure mode across the registration surface: transport,
/// remote API rejections, local credential state, and TLS trust validation.
/// The variants mirror the `err_type` taxonomy of the wire envelope -- see
/// [`crate::envelope`] for the mapping in both directions.
#[derive(Debug, Error)]
pub enum Error {
    // ── Remote API ──────────────────────────────────────────────────
    /// The server rejected the request. Carries the HTTP status code and
    /// the server-provided message. Never retried.
    #[error("Registration server returned '{message}' ({code})")]
    Api { code: u16, message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    /// Transient cases are retried with backoff before this surfaces.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS certificate validation failed. May be resolved interactively via
    /// the verification callback before becoming terminal.
    #[error("SSL error: {0}")]
    Ssl(SslError),

    // ── Local credential state ──────────────────────────────────────
    /// The credentials file does not exist (expected first-run state).
    #[error("Credentials file is missing: {path}")]
    MissingCredentialsFile { path: String },

    /// The credentials file exists but cannot be parsed.
    #[error("Cannot parse credentials file: {path}")]
    MalformedCredentialsFile { path: String },

    /// Local I/O failure outside the classified credential cases.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The response body violated the envelope protocol.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Certificate blob could not be decoded.
    #[error("Invalid certificate: {0}")]
    InvalidCertificate(String),

    /// External trust-store refresh command failed.
    #[error("Trust store update failed: {0}")]
    TrustStoreUpdate(String),

    // ── Forward compatibility ───────────────────────────────────────
    /// Unrecognized remote error kind; the message is surfaced verbatim.
    #[error("{message}")]
    Unknown { message: String },
}

/// TLS trust validation failure details.
///
/// `code` follows the OpenSSL verify return values (`man verify`):
/// 10 for an expired certificate, 19 for a self-signed or otherwise
/// untrusted chain. `peer_cert` holds the server certificate in PEM form
/// when it could be captured, so callers can fingerprint it and decide
/// whether to import it as a trust anchor.
#[derive(Debug, Clone)]
pub struct SslError {
    pub code: u16,
    pub message: String,
    pub peer_cert: Option<String>,
}

impl std::fmt::Display for SslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

// OpenSSL verify return values used for `SslError::code`.
pub(crate) const X509_V_ERR_CERT_HAS_EXPIRED: u16 = 10;
pub(crate) const X509_V_ERR_SELF_SIGNED_CERT_IN_CHAIN: u16 = 19;

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Only transport-level failures qualify; HTTP status errors and TLS
    /// validation failures are terminal for the attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if the error means the system has no usable identity
    /// and a fresh announce could resolve it.
    pub fn needs_announce(&self) -> bool {
        matches!(
            self,
            Self::MissingCredentialsFile { .. } | Self::Api { code: 401, .. }
        )
    }

    /// Extract the remote status code, if this is an API rejection.
    pub fn api_code(&self) -> Option<u16> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}
