// System-level operations: announce, metadata refresh, deregistration.

use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;

use crate::client::{Auth, RegistrationClient};
use crate::credentials::Credentials;
use crate::error::Error;
use crate::models::SystemInfo;
use crate::sink::LogLevel;

#[derive(Debug, Deserialize)]
struct AnnounceResponse {
    login: String,
    password: String,
}

impl RegistrationClient {
    /// Register this machine with the service, yielding its identity.
    ///
    /// Authenticates with the given regcode; `system` carries the metadata
    /// bundled with the announcement and `distro_target` overrides the
    /// target hint inside it. Safe to repeat with the same regcode: the
    /// server returns the existing identity instead of creating a
    /// duplicate registration.
    ///
    /// The returned credentials are NOT persisted; callers decide where
    /// they live (see [`crate::credentials::write`]).
    pub async fn announce(
        &self,
        regcode: &str,
        system: &SystemInfo,
        distro_target: Option<&str>,
    ) -> Result<Credentials, Error> {
        let payload = system_payload(system, distro_target)?;
        let response: AnnounceResponse = self
            .request(
                Method::POST,
                "/connect/subscriptions/systems",
                &payload,
                Auth::Token(regcode),
            )
            .await?;

        self.sink()
            .log(LogLevel::Info, "system announced to registration server");
        Ok(Credentials::new(&response.login, &response.password))
    }

    /// Refresh the server-side hardware/system metadata for an announced
    /// system. Requires valid stored credentials.
    pub async fn update_system(
        &self,
        system: &SystemInfo,
        distro_target: Option<&str>,
    ) -> Result<(), Error> {
        let payload = system_payload(system, distro_target)?;
        self.request_ack(Method::PUT, "/connect/systems", &payload, Auth::System)
            .await
    }

    /// Remove this system from the server.
    ///
    /// Local credential cleanup is the caller's responsibility; the stored
    /// identity is invalid after this returns.
    pub async fn deregister_system(&self) -> Result<(), Error> {
        self.request_ack(
            Method::DELETE,
            "/connect/systems",
            &Value::Object(serde_json::Map::new()),
            Auth::System,
        )
        .await
    }
}

fn system_payload(system: &SystemInfo, distro_target: Option<&str>) -> Result<Value, Error> {
    let mut payload = serde_json::to_value(system)?;
    if let (Some(target), Value::Object(object)) = (distro_target, &mut payload) {
        object.insert("distro_target".into(), Value::String(target.to_owned()));
    }
    Ok(payload)
}
