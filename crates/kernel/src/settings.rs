use std::path::PathBuf;

use anyhow::{anyhow, Context};
use serde::Deserialize;

const DEFAULT_ENV: &str = "local";
const ENV_VAR_NAME: &str = "SHELF_ENV";
const CONFIG_DIR_ENV: &str = "SHELF_CONFIG_DIR";

/// Deployment environment the application is running in.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Local,
    Staging,
    Production,
}

/// Top-level configuration structure loaded from layered sources.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    #[serde(default)]
    pub auth: AuthSettings,
}

impl Settings {
    /// Load configuration by layering `.env`, base file, environment overlay,
    /// and `SHELF_*` variables (nested keys separated by `__`, e.g.
    /// `SHELF_SERVER__PORT`).
    pub fn load() -> anyhow::Result<Self> {
        // Allow missing `.env` files without failing.
        let _ = dotenvy::dotenv();

        let environment = std::env::var(ENV_VAR_NAME).unwrap_or_else(|_| DEFAULT_ENV.to_string());
        let config_dir = match std::env::var(CONFIG_DIR_ENV) {
            Ok(dir) => PathBuf::from(dir),
            Err(_) => std::env::current_dir()
                .context("unable to resolve current directory")?
                .join("config"),
        };

        let base_path = config_dir.join("base.toml");
        let environment_filename = format!("{}.toml", environment);
        let environment_path = config_dir.join(environment_filename);

        let builder = config::Config::builder()
            .add_source(config::File::from(base_path).required(false))
            .add_source(config::File::from(environment_path).required(false))
            .add_source(
                config::Environment::with_prefix("SHELF")
                    .prefix_separator("_")
                    .separator("__"),
            );

        let cfg = builder
            .build()
            .with_context(|| "failed to build configuration")?;

        let mut settings: Settings = cfg
            .try_deserialize()
            .with_context(|| "failed to deserialize configuration")?;

        // Override environment field with parsed enum variant.
        settings.environment = match environment.as_str() {
            "local" => Environment::Local,
            "staging" => Environment::Staging,
            "production" => Environment::Production,
            other => {
                return Err(anyhow!(
                    "unsupported environment '{}'; expected local/staging/production",
                    other
                ));
            }
        };

        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "ServerSettings::default_host")]
    pub host: String,
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
    #[serde(default = "ServerSettings::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl ServerSettings {
    fn default_host() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        3000
    }

    fn default_request_timeout_ms() -> u64 {
        15000
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            request_timeout_ms: Self::default_request_timeout_ms(),
        }
    }
}

/// Where uploaded book assets are kept.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    #[serde(default = "StorageSettings::default_asset_dir")]
    pub asset_dir: PathBuf,
    /// Largest accepted book upload body (form fields plus both files).
    #[serde(default = "StorageSettings::default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl StorageSettings {
    fn default_asset_dir() -> PathBuf {
        PathBuf::from("data/assets")
    }

    fn default_max_upload_bytes() -> usize {
        64 * 1024 * 1024
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            asset_dir: Self::default_asset_dir(),
            max_upload_bytes: Self::default_max_upload_bytes(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    #[serde(default)]
    pub log_format: LogFormat,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "TelemetrySettings::default_filter")]
    pub filter: String,
}

impl TelemetrySettings {
    fn default_filter() -> String {
        "info,tower_http=info".to_string()
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            filter: Self::default_filter(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Administrator provisioned at start-up. The hash is an Argon2 PHC string
/// (see `shelf hash-password`).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AdminSeed {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthSettings {
    #[serde(default = "AuthSettings::default_session_ttl_secs")]
    pub session_ttl_secs: i64,
    #[serde(default = "AuthSettings::default_cookie_name")]
    pub cookie_name: String,
    #[serde(default)]
    pub secure_cookie: bool,
    /// Answer every failed login with the same message.
    #[serde(default)]
    pub generic_login_errors: bool,
    #[serde(default)]
    pub admins: Vec<AdminSeed>,
}

impl AuthSettings {
    fn default_session_ttl_secs() -> i64 {
        60 * 60
    }

    fn default_cookie_name() -> String {
        "shelf_session".to_string()
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: Self::default_session_ttl_secs(),
            cookie_name: Self::default_cookie_name(),
            secure_cookie: false,
            generic_login_errors: false,
            admins: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_environment_is_local() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Local);
    }

    #[test]
    fn default_session_lasts_one_hour() {
        let settings = Settings::default();
        assert_eq!(settings.auth.session_ttl_secs, 3600);
        assert_eq!(settings.auth.cookie_name, "shelf_session");
        assert!(settings.auth.admins.is_empty());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 9000

                [[auth.admins]]
                username = "root"
                password_hash = "$argon2id$stub"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let settings: Settings = cfg.try_deserialize().unwrap();

        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.host, "127.0.0.1");
        assert_eq!(settings.storage.asset_dir, PathBuf::from("data/assets"));
        assert_eq!(settings.storage.max_upload_bytes, 64 * 1024 * 1024);
        assert_eq!(settings.auth.admins.len(), 1);
        assert_eq!(settings.auth.admins[0].username, "root");
    }
}
