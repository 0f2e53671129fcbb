//! Connection configuration for the registration client.
//!
//! TOML file + environment overrides, and translation to
//! `entitle_api::RegistrationClientBuilder`. The file lives at a
//! well-known path; unknown keys are captured at load and written back
//! unchanged on save, so foreign tooling can park its own settings in the
//! same document. Saves are atomic (temp file + rename): a crashed writer
//! never leaves a partially written config behind.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use entitle_api::{RegistrationClient, RegistrationClientBuilder, TlsMode, TransportConfig};

/// Well-known config file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/entitle.toml";

/// Environment variable prefix for overrides (e.g. `ENTITLE_URL`).
const ENV_PREFIX: &str = "ENTITLE_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Config ──────────────────────────────────────────────────────────

/// Connection parameters for the registration service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Registration server base URL.
    #[serde(default = "default_url")]
    pub url: String,

    /// Skip TLS verification entirely. For test servers only.
    #[serde(default)]
    pub insecure: bool,

    /// `Accept-Language` for server messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Registration namespace (staging setups).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Explicit proxy URL; credentials may be embedded in the userinfo.
    /// Unset defers to the standard proxy environment variables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Keys this crate does not know about, preserved across a
    /// load → save round trip.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            url: default_url(),
            insecure: false,
            language: None,
            namespace: None,
            proxy: None,
            timeout: default_timeout(),
            extra: BTreeMap::new(),
        }
    }
}

fn default_url() -> String {
    entitle_api::DEFAULT_BASE_URL.to_owned()
}

fn default_timeout() -> u64 {
    60
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load configuration: built-in defaults → TOML file → `ENTITLE_*` env.
///
/// A missing file is the normal unconfigured state and yields defaults;
/// a file that exists but cannot be parsed is an error.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX));

    Ok(figment.extract()?)
}

/// Load from the well-known path.
pub fn load() -> Result<Config, ConfigError> {
    load_from(Path::new(DEFAULT_CONFIG_PATH))
}

// ── Saving ──────────────────────────────────────────────────────────

/// Persist the config as TOML, atomically.
pub fn save_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let rendered = toml::to_string_pretty(config)?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(rendered.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ConfigError::Io(e.error))?;
    Ok(())
}

/// Persist to the well-known path.
pub fn save(config: &Config) -> Result<(), ConfigError> {
    save_to(config, Path::new(DEFAULT_CONFIG_PATH))
}

// ── Conversion ──────────────────────────────────────────────────────

impl Config {
    /// Transport settings implied by this config.
    pub fn transport(&self) -> Result<TransportConfig, ConfigError> {
        let proxy = match &self.proxy {
            Some(raw) => Some(Url::parse(raw).map_err(|e| ConfigError::Validation {
                field: "proxy".into(),
                reason: e.to_string(),
            })?),
            None => None,
        };
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else {
            TlsMode::System
        };
        Ok(TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout),
            proxy,
            ..TransportConfig::default()
        })
    }

    /// A client builder pre-populated from this config. Callers chain
    /// their sink / callback / credentials-path choices before `build()`.
    pub fn client_builder(&self) -> Result<RegistrationClientBuilder, ConfigError> {
        Url::parse(&self.url).map_err(|e| ConfigError::Validation {
            field: "url".into(),
            reason: e.to_string(),
        })?;

        let mut builder = RegistrationClient::builder()
            .base_url(&self.url)
            .transport(self.transport()?);
        if let Some(language) = &self.language {
            builder = builder.language(language);
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn defaults_when_file_is_missing() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let config = load_from(Path::new("does-not-exist.toml")).expect("load");
            assert_eq!(config.url, "https://scc.suse.com");
            assert!(!config.insecure);
            assert_eq!(config.timeout, 60);
            Ok(())
        });
    }

    #[test]
    fn file_values_override_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "entitle.toml",
                r#"
                    url = "https://rmt.internal.example.com"
                    insecure = true
                    language = "de_DE.UTF-8"
                "#,
            )?;
            let config = load_from(Path::new("entitle.toml")).expect("load");
            assert_eq!(config.url, "https://rmt.internal.example.com");
            assert!(config.insecure);
            assert_eq!(config.language.as_deref(), Some("de_DE.UTF-8"));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("entitle.toml", r#"url = "https://from-file.example.com""#)?;
            jail.set_env("ENTITLE_URL", "https://from-env.example.com");
            let config = load_from(Path::new("entitle.toml")).expect("load");
            assert_eq!(config.url, "https://from-env.example.com");
            Ok(())
        });
    }

    #[test]
    fn unknown_keys_survive_a_round_trip() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "entitle.toml",
                r#"
                    url = "https://rmt.internal.example.com"
                    auto_agree_with_licenses = true
                    zypper_root = "/mnt/target"
                "#,
            )?;
            let config = load_from(Path::new("entitle.toml")).expect("load");
            assert_eq!(
                config.extra.get("auto_agree_with_licenses"),
                Some(&serde_json::Value::Bool(true))
            );

            let out = std::path::PathBuf::from("rewritten.toml");
            save_to(&config, &out).expect("save");
            let reloaded = load_from(&out).expect("reload");
            assert_eq!(reloaded.url, config.url);
            assert_eq!(
                reloaded.extra.get("zypper_root").and_then(|v| v.as_str()),
                Some("/mnt/target")
            );
            Ok(())
        });
    }

    #[test]
    fn insecure_maps_to_danger_tls_mode() {
        let config = Config {
            insecure: true,
            ..Config::default()
        };
        let transport = config.transport().expect("transport");
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
    }

    #[test]
    fn invalid_proxy_is_a_validation_error() {
        let config = Config {
            proxy: Some("not a url".into()),
            ..Config::default()
        };
        assert!(matches!(
            config.transport(),
            Err(ConfigError::Validation { .. })
        ));
    }

    #[test]
    fn invalid_url_is_a_validation_error() {
        let config = Config {
            url: "://nope".into(),
            ..Config::default()
        };
        assert!(matches!(
            config.client_builder(),
            Err(ConfigError::Validation { .. })
        ));
    }
}
