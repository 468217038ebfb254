//! Runtime settings: repository deadlines and logging.
//!
//! Settings come from a TOML file (every key optional) and may then be overridden by
//! `DOCREPO_*` environment variables.
//!
//! ```toml
//! [repository]
//! op_timeout_ms = 5000
//!
//! [logging]
//! dir = "logs"
//! level = "debug"
//! retention = 3
//! dev_trace = true
//! ```

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_OP_TIMEOUT_MS: &str = "DOCREPO_OP_TIMEOUT_MS";
pub const ENV_LOG_DIR: &str = "DOCREPO_LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "DOCREPO_LOG_LEVEL";
pub const ENV_LOG_RETENTION: &str = "DOCREPO_LOG_RETENTION";
pub const ENV_DEV6: &str = "DOCREPO_DEV6";

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Deadline applied to every repository operation.
    pub op_timeout_ms: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self { op_timeout_ms: 15_000 }
    }
}

impl RepositoryConfig {
    #[must_use]
    pub const fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }

    /// Saturates at `u64::MAX` milliseconds.
    #[must_use]
    pub fn with_op_timeout(op_timeout: Duration) -> Self {
        Self { op_timeout_ms: u64::try_from(op_timeout.as_millis()).unwrap_or(u64::MAX) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Directory for rolling log files; the working directory when unset.
    pub dir: Option<PathBuf>,
    /// One of error, warn, info, debug, trace.
    pub level: String,
    /// Rolled files kept per appender.
    pub retention: u32,
    /// Persist `dev6!` traces to `dev6.log`.
    pub dev_trace: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { dir: None, level: "info".to_string(), retention: 7, dev_trace: false }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub repository: RepositoryConfig,
    pub logging: LogConfig,
}

impl Settings {
    /// # Errors
    /// Fails on TOML syntax errors and on values that do not validate.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// # Errors
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Applies `DOCREPO_*` overrides from the process environment.
    ///
    /// # Errors
    /// Fails when a variable is set to a value that does not parse or validate.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    pub(crate) fn apply_vars(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = var(ENV_OP_TIMEOUT_MS) {
            self.repository.op_timeout_ms = parse_num(ENV_OP_TIMEOUT_MS, &v)?;
        }
        if let Some(v) = var(ENV_LOG_DIR) {
            self.logging.dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var(ENV_LOG_LEVEL) {
            self.logging.level = v.trim().to_ascii_lowercase();
        }
        if let Some(v) = var(ENV_LOG_RETENTION) {
            self.logging.retention = parse_num(ENV_LOG_RETENTION, &v)?;
        }
        if let Some(v) = var(ENV_DEV6) {
            self.logging.dev_trace = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.repository.op_timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "repository.op_timeout_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        if !LEVELS.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Invalid {
                key: "logging.level".into(),
                reason: format!("unknown level {:?}", self.logging.level),
            });
        }
        Ok(())
    }
}

fn parse_num<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, ConfigError>
where
    N::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: N::Err| ConfigError::Invalid {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
