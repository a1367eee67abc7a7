//! Typed settings for Tally, layered from defaults, a TOML file and the environment.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use tally_core::CurrencyCode;
use tally_split::MismatchPolicy;

/// File consulted when no explicit path is given. Missing is fine.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of environment overrides, e.g. `TALLY__DATABASE__PATH`.
pub const ENV_PREFIX: &str = "TALLY";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    pub database: DatabaseConfig,
    pub log: LogConfig,
    pub split: SplitConfig,
    pub events: EventsConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/tally.db"),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub format: LogFormat,
    /// When set, logs also go to a daily-rolling file in this directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
            directory: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("unknown log format '{other}'")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub mismatch_policy: MismatchPolicy,
    pub default_currency: CurrencyCode,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            mismatch_policy: MismatchPolicy::default(),
            default_currency: CurrencyCode::usd(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}

/// Load settings from defaults, then the TOML file, then `TALLY__*` variables.
///
/// An explicit `path` must exist; otherwise [`DEFAULT_CONFIG_PATH`] is used if present.
pub fn load_config(path: Option<&Path>) -> Result<TallyConfig> {
    build(path, None)
}

/// Like [`load_config`], reading overrides from `env` instead of the process environment.
pub fn load_config_with_env(
    path: Option<&Path>,
    env: HashMap<String, String>,
) -> Result<TallyConfig> {
    build(path, Some(env))
}

fn build(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<TallyConfig> {
    let defaults =
        Config::try_from(&TallyConfig::default()).context("failed to serialize defaults")?;
    let file = match path {
        Some(path) => File::from(path).format(FileFormat::Toml).required(true),
        None => File::with_name(DEFAULT_CONFIG_PATH)
            .format(FileFormat::Toml)
            .required(false),
    };
    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
        .source(env);

    let settings = Config::builder()
        .add_source(defaults)
        .add_source(file)
        .add_source(environment)
        .build()
        .with_context(|| match path {
            Some(path) => format!("failed to load configuration from {}", path.display()),
            None => "failed to load configuration".to_string(),
        })?;
    settings
        .try_deserialize()
        .context("invalid configuration values")
}
