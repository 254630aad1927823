//! # mm-config
//!
//! Layered runtime settings: built-in defaults, then an optional `memeow.toml`,
//! then `MEMEOW__SECTION__KEY` environment variables (a `.env` file is honored).

use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Salt shipped for local development only.
pub const DEV_SESSION_SALT: &str = "dev-salt-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub media: MediaSettings,
    pub auth: AuthSettings,
    pub log: LogSettings,
}

#[derive(Debug, Deserialize)]
pub struct DatabaseSettings {
    /// sqlx connection string, e.g. `sqlite:memeow.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize)]
pub struct MediaSettings {
    pub root: PathBuf,
    pub url_prefix: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    pub session_salt: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    pub json: bool,
}

impl Settings {
    /// Loads settings from `.env`, `memeow.toml` and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_sources(Some("memeow"), None)
    }

    /// Builds settings from an optional config file stem and an explicit
    /// environment map (the process environment when `None`).
    pub fn from_sources(
        file_stem: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("database.url", "sqlite:memeow.db")?
            .set_default("database.max_connections", 5)?
            .set_default("media.root", "./data/uploads")?
            .set_default("media.url_prefix", "/static/uploads")?
            .set_default("auth.session_salt", DEV_SESSION_SALT)?
            .set_default("log.filter", "memeow=info,mm_services=info")?
            .set_default("log.json", false)?;

        if let Some(stem) = file_stem {
            builder = builder.add_source(File::with_name(stem).required(false));
        }

        let settings: Settings = builder
            .add_source(
                Environment::with_prefix("MEMEOW")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be at least 1".into(),
            ));
        }
        let salt = self.auth.session_salt.expose_secret();
        if salt.trim().is_empty() {
            return Err(ConfigError::Invalid("auth.session_salt must not be empty".into()));
        }
        Ok(())
    }

    /// Whether the shipped development salt is still in use.
    pub fn uses_dev_salt(&self) -> bool {
        self.auth.session_salt.expose_secret() == DEV_SESSION_SALT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn defaults_apply_without_sources() {
        let settings = Settings::from_sources(None, env(&[])).unwrap();
        assert_eq!(settings.database.url, "sqlite:memeow.db");
        assert_eq!(settings.database.max_connections, 5);
        assert_eq!(settings.media.url_prefix, "/static/uploads");
        assert!(!settings.log.json);
        assert!(settings.uses_dev_salt());
    }

    #[test]
    fn environment_overrides_defaults() {
        let settings = Settings::from_sources(
            None,
            env(&[
                ("MEMEOW__DATABASE__URL", "sqlite::memory:"),
                ("MEMEOW__DATABASE__MAX_CONNECTIONS", "2"),
                ("MEMEOW__AUTH__SESSION_SALT", "s3cret"),
                ("MEMEOW__LOG__JSON", "true"),
            ]),
        )
        .unwrap();
        assert_eq!(settings.database.url, "sqlite::memory:");
        assert_eq!(settings.database.max_connections, 2);
        assert_eq!(settings.auth.session_salt.expose_secret(), "s3cret");
        assert!(settings.log.json);
        assert!(!settings.uses_dev_salt());
    }

    #[test]
    fn zero_connections_is_rejected() {
        let err = Settings::from_sources(None, env(&[("MEMEOW__DATABASE__MAX_CONNECTIONS", "0")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
