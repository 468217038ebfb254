//! log4rs setup for the crate's three log streams.
//!
//! - `app.log`: everything not routed elsewhere.
//! - `audit.log`: target [`AUDIT_TARGET`], one line per mutating repository operation.
//! - `dev6.log`: target [`DEV6_TARGET`], written only when `LogConfig::dev_trace` is on.
//!
//! Files roll at 10 MiB and keep `LogConfig::retention` generations. Calling a configure
//! function again replaces the active configuration.

use crate::config::{LogConfig, Settings};
use log::LevelFilter;
use log4rs::Handle;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const AUDIT_TARGET: &str = "docrepo::audit";
pub const DEV6_TARGET: &str = "docrepo::dev6";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

static HANDLE: OnceLock<Handle> = OnceLock::new();

/// Initializes logging from `log4rs.yaml` in the working directory.
///
/// # Errors
/// Returns an error if the file is missing or invalid, or a logger is already installed.
pub fn init() -> Result<(), Box<dyn Error>> {
    init_path(Path::new("log4rs.yaml"))
}

/// Initializes logging from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file is missing or invalid, or a logger is already installed.
pub fn init_path(path: &Path) -> Result<(), Box<dyn Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Maps a level name to a filter; unknown names mean `Info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn Error>> {
    let pattern = base.join(format!("{stem}.{{}}.log"));
    let roller = FixedWindowRoller::builder().build(&pattern.display().to_string(), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    let appender = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))?;
    Ok(appender)
}

/// Builds the log4rs configuration for `cfg` without installing it.
///
/// # Errors
/// Returns an error if the log directory or an appender cannot be created.
pub fn build_config(cfg: &LogConfig) -> Result<Config, Box<dyn Error>> {
    let base = match &cfg.dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    };
    std::fs::create_dir_all(&base)?;
    let keep = cfg.retention.max(1);
    let lvl = parse_level(&cfg.level);

    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(&base, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(&base, "audit", keep)?)))
        .logger(
            Logger::builder()
                .appender("audit")
                .additive(false)
                .build(AUDIT_TARGET, lvl.max(LevelFilter::Info)),
        );

    builder = if cfg.dev_trace {
        builder
            .appender(Appender::builder().build("dev6", Box::new(rolling(&base, "dev6", keep)?)))
            .logger(
                Logger::builder().appender("dev6").additive(false).build(DEV6_TARGET, LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build(DEV6_TARGET, LevelFilter::Off))
    };

    Ok(builder.build(Root::builder().appender("app").build(lvl))?)
}

/// Installs (or replaces) the process-wide configuration for `cfg`.
///
/// # Errors
/// Returns an error if the configuration cannot be built or another logger owns the process.
pub fn configure(cfg: &LogConfig) -> Result<(), Box<dyn Error>> {
    let config = build_config(cfg)?;
    if let Some(handle) = HANDLE.get() {
        handle.set_config(config);
        return Ok(());
    }
    let handle = log4rs::init_config(config)?;
    remember(&HANDLE, handle);
    Ok(())
}

/// Stores `value` unless another caller got there first; returns whether it was stored.
fn remember<H>(cell: &OnceLock<H>, value: H) -> bool {
    let stored = cell.set(value).is_ok();
    if !stored {
        log::debug!("logger handle already stored by a concurrent configure");
    }
    stored
}

/// Convenience wrapper over [`configure`] with dev traces off.
///
/// # Errors
/// See [`configure`].
pub fn configure_logging(
    dir: Option<&Path>,
    level: Option<&str>,
    retention: Option<u32>,
) -> Result<(), Box<dyn Error>> {
    let defaults = LogConfig::default();
    configure(&LogConfig {
        dir: dir.map(Path::to_path_buf),
        level: level.map_or(defaults.level, str::to_string),
        retention: retention.unwrap_or(defaults.retention),
        dev_trace: false,
    })
}

/// Configures logging from the `DOCREPO_LOG_*` and `DOCREPO_DEV6` environment variables.
///
/// # Errors
/// Returns an error if a variable is invalid or the configuration cannot be installed.
pub fn configure_from_env() -> Result<(), Box<dyn Error>> {
    let settings = Settings::default().apply_env()?;
    configure(&settings.logging)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("trace"), LevelFilter::Trace);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }

    #[test]
    fn second_handle_is_reported_not_stored() {
        let cell = OnceLock::new();
        assert!(remember(&cell, 1_u8));
        assert!(!remember(&cell, 2_u8));
        assert_eq!(cell.get(), Some(&1));
    }

    #[test]
    fn build_config_creates_directory_and_dev_appender() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("logs");
        let cfg = LogConfig { dir: Some(dir.clone()), dev_trace: true, ..LogConfig::default() };
        let config = build_config(&cfg).unwrap();
        assert!(dir.is_dir());
        let names: Vec<&str> = config.appenders().iter().map(|a| a.name()).collect();
        assert_eq!(names, ["app", "audit", "dev6"]);
        assert!(config.loggers().iter().any(|l| l.name() == DEV6_TARGET));

        let quiet = build_config(&LogConfig { dir: Some(dir), ..LogConfig::default() }).unwrap();
        assert_eq!(quiet.appenders().len(), 2);
    }
}
