// Registration client
//
// Wraps `reqwest::Client` with the /connect wire conventions: envelope
// decoding, the three auth modes (none / system credentials / regcode
// token), System-Token rotation, bounded retry for transient network
// failures, and the interactive TLS verification flow. Endpoint families
// (system, products, migrations, status) are implemented as inherent
// methods in separate files to keep this module focused on transport
// mechanics.

use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_retry::RetryIf;
use tracing::debug;
use url::Url;

use crate::credentials::{self, Credentials};
use crate::envelope;
use crate::error::{
    Error, SslError, X509_V_ERR_CERT_HAS_EXPIRED, X509_V_ERR_SELF_SIGNED_CERT_IN_CHAIN,
};
use crate::sink::{LogLevel, LogSink, NullSink};
use crate::transport::{RetryPolicy, TransportConfig, probe_peer_certificate};

/// Default registration service.
pub const DEFAULT_BASE_URL: &str = "https://scc.suse.com";

/// Versioned media type accepted from the server.
const API_ACCEPT: &str = "application/json,application/vnd.scc.suse.com.v4+json";

const SYSTEM_TOKEN_HEADER: &str = "System-Token";

/// Decision callback invoked when TLS trust validation fails.
///
/// Runs synchronously on the calling task during the failed operation and
/// must not call back into the client. Returning `true` reloads the trust
/// pool and retries the request once; `false` (or no callback) makes the
/// failure terminal.
pub type VerifyCallback = dyn Fn(&SslError) -> bool + Send + Sync;

/// Authentication mode for a single request.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Auth<'a> {
    /// Unauthenticated endpoint.
    None,
    /// HTTP basic auth from the stored system credentials.
    System,
    /// `Authorization: Token token=<regcode>` for announce.
    Token(&'a str),
}

/// Async client for SCC-compatible registration servers.
///
/// Holds no cross-call mutable state beyond the rebuildable HTTP client;
/// credentials are re-read from disk on every authenticated call so
/// concurrent writers (announce in another process) are picked up without
/// caching hazards. Construct via [`RegistrationClient::builder`].
pub struct RegistrationClient {
    http: RwLock<reqwest::Client>,
    base_url: Url,
    transport: TransportConfig,
    credentials_path: PathBuf,
    language: Option<String>,
    retry: RetryPolicy,
    sink: Arc<dyn LogSink>,
    verify_callback: Option<Arc<VerifyCallback>>,
}

/// Builder for [`RegistrationClient`].
pub struct RegistrationClientBuilder {
    base_url: String,
    transport: TransportConfig,
    credentials_path: PathBuf,
    language: Option<String>,
    retry: RetryPolicy,
    sink: Arc<dyn LogSink>,
    verify_callback: Option<Arc<VerifyCallback>>,
}

impl Default for RegistrationClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            transport: TransportConfig::default(),
            credentials_path: PathBuf::from(credentials::SYSTEM_CREDENTIALS_FILE),
            language: None,
            retry: RetryPolicy::default(),
            sink: Arc::new(NullSink),
            verify_callback: None,
        }
    }
}

impl RegistrationClientBuilder {
    /// Service base URL (default `https://scc.suse.com`).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Where system credentials are read from and persisted to.
    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = path.into();
        self
    }

    /// `Accept-Language` sent with every request.
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Log sink for this instance. Without one, events are dropped.
    pub fn sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Callback consulted on TLS trust validation failure.
    pub fn verify_callback(mut self, callback: Arc<VerifyCallback>) -> Self {
        self.verify_callback = Some(callback);
        self
    }

    pub fn build(self) -> Result<RegistrationClient, Error> {
        let base_url = Url::parse(&self.base_url)?;
        let http = self.transport.build_client()?;
        Ok(RegistrationClient {
            http: RwLock::new(http),
            base_url,
            transport: self.transport,
            credentials_path: self.credentials_path,
            language: self.language,
            retry: self.retry,
            sink: self.sink,
            verify_callback: self.verify_callback,
        })
    }
}

impl RegistrationClient {
    pub fn builder() -> RegistrationClientBuilder {
        RegistrationClientBuilder::default()
    }

    /// The service base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The credentials file this client reads and persists.
    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Read the stored system credentials.
    pub fn credentials(&self) -> Result<Credentials, Error> {
        credentials::read(&self.credentials_path)
    }

    /// Rebuild the HTTP client so the transport re-reads trust anchors.
    ///
    /// Call after [`crate::certs::TrustStore::import`] to pick the new
    /// anchor up without a process restart.
    pub fn reload_certificates(&self) -> Result<(), Error> {
        let rebuilt = self.transport.build_client()?;
        *self.http.write().expect("http client lock poisoned") = rebuilt;
        self.sink.log(LogLevel::Debug, "trust pool reloaded");
        Ok(())
    }

    fn http(&self) -> reqwest::Client {
        self.http.read().expect("http client lock poisoned").clone()
    }

    pub(crate) fn sink(&self) -> &dyn LogSink {
        self.sink.as_ref()
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
        auth: Auth<'_>,
    ) -> Result<T, Error> {
        let body = self.call(Method::GET, path, query, None, auth).await?;
        envelope::decode(&body)
    }

    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        payload: &impl serde::Serialize,
        auth: Auth<'_>,
    ) -> Result<T, Error> {
        let payload = serde_json::to_value(payload)?;
        let body = self.call(method, path, &[], Some(payload), auth).await?;
        envelope::decode(&body)
    }

    /// Like [`Self::request`] but for ack-only endpoints: an empty 2xx
    /// body counts as success alongside a `{"data": …}` envelope.
    pub(crate) async fn request_ack(
        &self,
        method: Method,
        path: &str,
        payload: &impl serde::Serialize,
        auth: Auth<'_>,
    ) -> Result<(), Error> {
        let payload = serde_json::to_value(payload)?;
        let body = self.call(method, path, &[], Some(payload), auth).await?;
        if body.is_empty() {
            return Ok(());
        }
        match envelope::split(&body)? {
            Ok(_) => Ok(()),
            Err(wire) => Err(wire.into_error()),
        }
    }

    /// Issue one API call: bounded retry for transient failures, then the
    /// interactive TLS verification flow for trust errors.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<Value>,
        auth: Auth<'_>,
    ) -> Result<Vec<u8>, Error> {
        let result = RetryIf::spawn(
            self.retry.backoff(),
            || self.attempt(method.clone(), path, query, body.as_ref(), auth),
            Error::is_transient,
        )
        .await;

        match result {
            Err(Error::Ssl(ssl)) => {
                let Some(callback) = &self.verify_callback else {
                    return Err(Error::Ssl(ssl));
                };
                self.sink.log(
                    LogLevel::Info,
                    "TLS validation failed, consulting verification callback",
                );
                if !callback(&ssl) {
                    return Err(Error::Ssl(ssl));
                }
                // Caller accepted the certificate (and typically imported
                // it); re-read anchors and retry the request once.
                self.reload_certificates()?;
                self.attempt(method, path, query, body.as_ref(), auth).await
            }
            other => other,
        }
    }

    async fn attempt(
        &self,
        method: Method,
        path: &str,
        query: &[(&'static str, String)],
        body: Option<&Value>,
        auth: Auth<'_>,
    ) -> Result<Vec<u8>, Error> {
        let url = self.base_url.join(path)?;
        debug!("{method} {url}");

        // Snapshot credentials per call; never cached across calls.
        let creds = match auth {
            Auth::System => Some(credentials::read(&self.credentials_path)?),
            Auth::None | Auth::Token(_) => credentials::read(&self.credentials_path).ok(),
        };

        let mut request = self
            .http()
            .request(method, url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, API_ACCEPT);

        if let Some(language) = &self.language {
            request = request.header(reqwest::header::ACCEPT_LANGUAGE, language);
        }
        match (auth, &creds) {
            (Auth::System, Some(creds)) => {
                request = request.basic_auth(&creds.login, Some(&creds.password));
            }
            (Auth::Token(regcode), _) => {
                request = request.header(
                    reqwest::header::AUTHORIZATION,
                    format!("Token token={regcode}"),
                );
            }
            _ => {}
        }
        if let Some(creds) = &creds {
            if let Some(token) = &creds.system_token {
                request = request.header(SYSTEM_TOKEN_HEADER, token);
            }
        }
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return Err(self.classify_send_error(err).await),
        };

        // The server may rotate the per-system token on any response.
        if let Some(rotated) = response
            .headers()
            .get(SYSTEM_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
        {
            self.store_rotated_token(creds.as_ref(), &rotated);
        }

        let status = response.status();
        let bytes = response.bytes().await.map_err(Error::Network)?.to_vec();

        if !status.is_success() {
            // Prefer a structured error envelope; fall back to the plain
            // `{"error": …}` shape, then to the raw status.
            if let Ok(Err(wire)) = envelope::split(&bytes) {
                return Err(wire.into_error());
            }
            return Err(Error::Api {
                code: status.as_u16(),
                message: plain_error_message(&bytes).unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("request failed").to_owned()
                }),
            });
        }
        Ok(bytes)
    }

    fn store_rotated_token(&self, creds: Option<&Credentials>, rotated: &str) {
        let Some(creds) = creds else { return };
        if rotated.is_empty() || creds.system_token.as_deref() == Some(rotated) {
            return;
        }
        if let Err(err) = credentials::write(
            &creds.login,
            &creds.password,
            Some(rotated),
            &self.credentials_path,
        ) {
            // A failed token persist must not fail the API call itself.
            self.sink.log(
                LogLevel::Warning,
                &format!("could not persist rotated system token: {err}"),
            );
        }
    }

    async fn classify_send_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            return Error::Timeout {
                timeout_secs: self.transport.timeout.as_secs(),
            };
        }
        if is_certificate_error(&err) {
            let message = root_message(&err);
            let code = if message.to_lowercase().contains("expired") {
                X509_V_ERR_CERT_HAS_EXPIRED
            } else {
                X509_V_ERR_SELF_SIGNED_CERT_IN_CHAIN
            };
            let peer_cert = probe_peer_certificate(&self.base_url, self.transport.timeout)
                .await
                .map(|cert| cert.to_pem());
            return Error::Ssl(SslError {
                code,
                message,
                peer_cert,
            });
        }
        Error::Network(err)
    }
}

/// Walk the source chain looking for a TLS trust validation failure.
///
/// Trust errors must not be confused with transient handshake problems:
/// only validation failures go through the verification callback.
fn is_certificate_error(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(current) = source {
        let message = current.to_string().to_lowercase();
        if message.contains("certificate") || message.contains("unknownissuer") {
            return true;
        }
        source = current.source();
    }
    false
}

/// The innermost error message in the chain.
fn root_message(err: &reqwest::Error) -> String {
    let mut current: &(dyn std::error::Error + 'static) = err;
    while let Some(source) = current.source() {
        current = source;
    }
    current.to_string()
}

/// Parse the legacy `{"error": …, "localized_error": …}` body shape.
fn plain_error_message(body: &[u8]) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct PlainError {
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        localized_error: Option<String>,
    }

    let parsed: PlainError = serde_json::from_slice(body).ok()?;
    parsed
        .localized_error
        .filter(|m| !m.is_empty())
        .or(parsed.error)
        .filter(|m| !m.is_empty())
}
