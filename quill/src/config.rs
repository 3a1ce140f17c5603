//! Server configuration.
//!
//! Stored as JSON, by default in `.quill/config.json`. A few settings can
//! be overridden from the environment so deployments need not write
//! secrets to disk.

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use quill_core::handlers::Provisioning;
use quill_core::ConnectionSpec;
use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ServerError;

pub const CONFIG_DIR: &str = ".quill";
pub const CONFIG_FILE: &str = "config.json";

pub const ENV_DATABASE: &str = "QUILL_DATABASE";
pub const ENV_BIND: &str = "QUILL_BIND";
pub const ENV_JWT_SECRET: &str = "QUILL_JWT_SECRET";

/// Token signing settings.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct JwtConfig {
    /// HS256 signing secret. Must not be empty.
    pub secret: String,
    pub issuer: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        JwtConfig {
            secret: String::new(),
            issuer: "quill".to_string(),
            access_ttl_minutes: 5,
            refresh_ttl_days: 1,
        }
    }
}

/// Longest accepted access token lifetime: one day.
pub const MAX_ACCESS_TTL_MINUTES: i64 = 24 * 60;
/// Longest accepted refresh token lifetime: one year.
pub const MAX_REFRESH_TTL_DAYS: i64 = 365;

impl JwtConfig {
    /// Check the token lifetimes are positive and within bounds.
    pub fn validate_lifetimes(&self) -> Result<(), ServerError> {
        if !(1..=MAX_ACCESS_TTL_MINUTES).contains(&self.access_ttl_minutes) {
            return Err(ServerError::Config(format!(
                "jwt.access_ttl_minutes must be between 1 and {MAX_ACCESS_TTL_MINUTES}"
            )));
        }
        if !(1..=MAX_REFRESH_TTL_DAYS).contains(&self.refresh_ttl_days) {
            return Err(ServerError::Config(format!(
                "jwt.refresh_ttl_days must be between 1 and {MAX_REFRESH_TTL_DAYS}"
            )));
        }
        Ok(())
    }

    /// A random alphanumeric secret suitable for [`JwtConfig::secret`].
    pub fn generate_secret() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(48)
            .map(char::from)
            .collect()
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: ConnectionSpec,
    pub bind: String,
    pub pool_size: u32,
    pub provisioning: Provisioning,
    pub jwt: JwtConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database: ConnectionSpec::new(format!("{CONFIG_DIR}/quill.db")),
            bind: "127.0.0.1:8000".to_string(),
            pool_size: 8,
            provisioning: Provisioning::Auto,
            jwt: JwtConfig::default(),
        }
    }
}

fn config_complete_if_dir(path: &Path) -> Cow<'_, Path> {
    if path.is_dir() {
        Cow::from(path.join(CONFIG_FILE))
    } else {
        Cow::from(path)
    }
}

impl Config {
    /// The default config location under `base`.
    pub fn default_path(base: &Path) -> PathBuf {
        base.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load a config file. `path` may name the file or its directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = config_complete_if_dir(path.as_ref());
        let file = fs::File::open(&path)
            .map_err(|e| ServerError::Config(format!("cannot open {}: {e}", path.display())))?;
        serde_json::from_reader(file)
            .map_err(|e| ServerError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Load `path` if it exists, otherwise start from the defaults. In
    /// both cases environment overrides are applied.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            Config::load(path)?
        } else {
            log::debug!("no config at {}, using defaults", path.display());
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ServerError> {
        let path = config_complete_if_dir(path.as_ref());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| ServerError::Config(e.to_string()))?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, which maps an environment variable
    /// name to its value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = ConnectionSpec::new(database);
        }
        if let Some(bind) = lookup(ENV_BIND) {
            self.bind = bind;
        }
        if let Some(secret) = lookup(ENV_JWT_SECRET) {
            self.jwt.secret = secret;
        }
    }

    /// Reject settings the server cannot start with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.jwt.secret.is_empty() {
            return Err(ServerError::Config(format!(
                "jwt.secret is empty; set it in the config file or {ENV_JWT_SECRET}"
            )));
        }
        self.jwt.validate_lifetimes()
    }
}
