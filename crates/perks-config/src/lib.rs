//! Shared configuration for the perks tools.
//!
//! TOML file, `PERKS_` environment overrides, token secret resolution,
//! and translation to `perks_core::PerksConfig`. The binary layers its
//! command-line flags on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use perks_core::{PerksConfig, TokenConfig};

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

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseSection,

    #[serde(default)]
    pub store: StoreSection,

    #[serde(default)]
    pub exchange: ExchangeSection,

    #[serde(default)]
    pub sweep: SweepSection,

    #[serde(default)]
    pub auth: AuthSection,

    #[serde(default)]
    pub log: LogSection,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseSection {
    /// SQLite file. Defaults to `perks.db` in the platform data directory.
    pub path: Option<PathBuf>,

    /// Keep everything in process; nothing survives the run.
    #[serde(default)]
    pub in_memory: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StoreSection {
    /// Deadline for each storage operation.
    #[serde(default = "default_op_timeout")]
    pub op_timeout_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            op_timeout_secs: default_op_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExchangeSection {
    /// Generated codes tried before an exchange gives up.
    #[serde(default = "default_code_attempts")]
    pub code_attempts: u32,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            code_attempts: default_code_attempts(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SweepSection {
    /// Seconds between expiry sweeps; 0 disables the sweep.
    #[serde(default)]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AuthSection {
    /// Token signing secret (plaintext, prefer `token_secret_env`).
    pub token_secret: Option<String>,

    /// Environment variable name containing the token signing secret.
    pub token_secret_env: Option<String>,

    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            token_secret: None,
            token_secret_env: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSection {
    #[serde(default)]
    pub format: LogFormat,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

fn default_op_timeout() -> u64 {
    3
}
fn default_code_attempts() -> u32 {
    3
}
fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "savingsquads", "perks")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("perks.toml"),
        |dirs| dirs.config_dir().join("perks.toml"),
    )
}

/// Default location of the SQLite database.
pub fn default_database_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback().join("perks.db"),
        |dirs| dirs.data_dir().join("perks.db"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("perks");
    p
}

// ── Loading and saving ──────────────────────────────────────────────

/// The provider chain: defaults, then the TOML file at `path`, then
/// `PERKS_`-prefixed environment variables (`__` separates sections,
/// e.g. `PERKS_AUTH__TOKEN_TTL_SECS`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PERKS_").split("__"))
}

/// Load from `path`, or the platform config path when `None`. A missing
/// file is not an error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    Ok(figment(&path).extract()?)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(cfg)?)?;
    Ok(())
}

// ── Resolution ──────────────────────────────────────────────────────

impl Config {
    /// The SQLite file to open, or `None` for an in-memory run.
    pub fn database_path(&self) -> Option<PathBuf> {
        if self.database.in_memory {
            return None;
        }
        Some(
            self.database
                .path
                .clone()
                .unwrap_or_else(default_database_path),
        )
    }

    /// Token signing secret: the variable named by `token_secret_env`
    /// first, then the plaintext `token_secret`.
    pub fn token_secret(&self) -> Option<SecretString> {
        if let Some(ref env_name) = self.auth.token_secret_env {
            if let Ok(val) = std::env::var(env_name) {
                return Some(SecretString::from(val));
            }
        }
        self.auth
            .token_secret
            .clone()
            .map(SecretString::from)
    }

    /// Build the runtime configuration for `perks_core::Perks`.
    ///
    /// `secret_override` takes precedence over any configured secret.
    /// Without any secret the token issuer stays disabled.
    pub fn to_perks_config(
        &self,
        secret_override: Option<SecretString>,
    ) -> Result<PerksConfig, ConfigError> {
        if self.store.op_timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "store.op_timeout_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.exchange.code_attempts == 0 {
            return Err(ConfigError::Validation {
                field: "exchange.code_attempts".into(),
                reason: "must be greater than 0".into(),
            });
        }
        if self.auth.token_ttl_secs == 0 {
            return Err(ConfigError::Validation {
                field: "auth.token_ttl_secs".into(),
                reason: "must be greater than 0".into(),
            });
        }

        let secret = secret_override
            .or_else(|| self.token_secret())
            .unwrap_or_else(|| SecretString::from(String::new()));
        let sweep_interval =
            (self.sweep.interval_secs > 0).then(|| Duration::from_secs(self.sweep.interval_secs));

        Ok(PerksConfig {
            op_timeout: Duration::from_secs(self.store.op_timeout_secs),
            code_attempts: self.exchange.code_attempts,
            sweep_interval,
            token: TokenConfig {
                secret,
                ttl: Duration::from_secs(self.auth.token_ttl_secs),
            },
        })
    }
}
