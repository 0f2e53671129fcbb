//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Exit codes for process termination.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Registration server rejected the request ({code}): {message}")]
    #[diagnostic(code(entitle::api_error))]
    Api { code: u16, message: String },

    #[error("Could not reach the registration server")]
    #[diagnostic(
        code(entitle::connection_failed),
        help("Check the server URL and your network/proxy settings.")
    )]
    Connection {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS certificate verification failed")]
    #[diagnostic(
        code(entitle::tls_error),
        help(
            "Inspect the certificate with: entitle cert fingerprint <file>\n\
             Import a trusted anchor with: entitle cert import <file>, or use --insecure (-k)."
        )
    )]
    Tls { message: String },

    #[error("This system is not registered")]
    #[diagnostic(
        code(entitle::not_registered),
        help("Announce it first: entitle register --regcode <CODE>")
    )]
    NotRegistered,

    #[error("Credentials file is corrupt: {path}")]
    #[diagnostic(
        code(entitle::bad_credentials),
        help("Re-register to rewrite it, or remove the file and announce again.")
    )]
    BadCredentials { path: String },

    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(entitle::timeout),
        help("Increase the timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(entitle::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(entitle::config))]
    Config(#[from] entitle_config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(entitle::json), help("Check the JSON file contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    #[diagnostic(code(entitle::client))]
    Other(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Connection { .. } | Self::Tls { .. } => exit_code::CONNECTION,
            Self::NotRegistered | Self::BadCredentials { .. } => exit_code::AUTH,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── entitle_api::Error → CliError mapping ───────────────────────────

impl From<entitle_api::Error> for CliError {
    fn from(err: entitle_api::Error) -> Self {
        use entitle_api::Error as Api;
        match err {
            Api::Api { code, message } => Self::Api { code, message },
            Api::Network(source) => Self::Connection {
                source: source.into(),
            },
            Api::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            Api::Ssl(ssl) => Self::Tls {
                message: ssl.message,
            },
            Api::MissingCredentialsFile { .. } => Self::NotRegistered,
            Api::MalformedCredentialsFile { path } => Self::BadCredentials { path },
            Api::Io(source) => Self::Io(source),
            Api::Json(source) => Self::Json(source),
            other => Self::Other(other.to_string()),
        }
    }
}
