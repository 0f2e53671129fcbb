// entitle-api: Async Rust client for SCC-compatible registration servers.
//
// Covers the full registration lifecycle against the /connect API:
// announce, product activation and migration, synchronization, and status,
// plus the local state that backs it -- the credential store and the
// certificate trust manager. Every wire response travels in the
// success-or-error envelope decoded by `envelope`; every failure maps into
// the `Error` taxonomy so callers can pick a recovery path.

pub mod certs;
pub mod client;
pub mod credentials;
pub mod envelope;
pub mod error;
pub mod models;
pub mod sink;
pub mod transport;

mod migrations;
mod products;
mod status;
mod system;

pub use certs::{Certificate, FingerprintAlgorithm, TrustStore};
pub use client::{DEFAULT_BASE_URL, RegistrationClient, RegistrationClientBuilder, VerifyCallback};
pub use credentials::Credentials;
pub use error::{Error, SslError};
pub use models::{Activation, MigrationPath, Product, Repository, Service, SystemInfo};
pub use sink::{LogLevel, LogSink, NullSink, TracingSink};
pub use status::{ProductStatus, RegistrationStatus};
pub use transport::{RetryPolicy, TlsMode, TransportConfig};
