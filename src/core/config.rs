//! Configuration: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{LoadError, Result};

/// Full loadcore configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub concurrency: ConcurrencySettings,
    pub workload: WorkloadSettings,
    pub logging: LoggingSettings,
}

/// Worker pool sizing and run timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConcurrencySettings {
    pub threads: usize,
    pub timeout_secs: u64,
}

/// Built-in payload workload used by the `run` command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WorkloadSettings {
    /// Total iterations, split across all threads.
    pub iterations: u64,
    /// Length of each generated buffer in bytes.
    pub payload_len: usize,
    /// Derive buffer contents from the iteration seed instead of the thread RNG.
    pub seeded: bool,
}

/// Where run events go.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingSettings {
    pub enabled: bool,
    pub jsonl_path: PathBuf,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

impl Default for ConcurrencySettings {
    fn default() -> Self {
        Self {
            threads: 1,
            timeout_secs: 600,
        }
    }
}

impl Default for WorkloadSettings {
    fn default() -> Self {
        Self {
            iterations: 1_000,
            payload_len: 1_024,
            seeded: false,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            jsonl_path: data_dir().join("runs.jsonl"),
            max_size_bytes: 16 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

fn home_dir() -> PathBuf {
    env::var_os("HOME").map_or_else(
        || {
            eprintln!("[LC-CONFIG] WARNING: HOME not set, falling back to /tmp");
            PathBuf::from("/tmp")
        },
        PathBuf::from,
    )
}

fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("loadcore")
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        home_dir()
            .join(".config")
            .join("loadcore")
            .join("config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// A missing file at the default path falls back to defaults; a missing
    /// explicit path is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|e| LoadError::io(&path_buf, e))?;
            Self::from_toml(&raw)?
        } else if path.is_some() {
            return Err(LoadError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML without env overrides or validation.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Deterministic FNV-1a hash of the effective config, for run logs.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("LOADCORE_THREADS") {
            self.concurrency.threads = parse_env("LOADCORE_THREADS", &raw)?;
        }
        if let Some(raw) = lookup("LOADCORE_TIMEOUT_SECS") {
            self.concurrency.timeout_secs = parse_env("LOADCORE_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("LOADCORE_ITERATIONS") {
            self.workload.iterations = parse_env("LOADCORE_ITERATIONS", &raw)?;
        }
        if let Some(raw) = lookup("LOADCORE_PAYLOAD_LEN") {
            self.workload.payload_len = parse_env("LOADCORE_PAYLOAD_LEN", &raw)?;
        }
        if let Some(raw) = lookup("LOADCORE_SEEDED") {
            self.workload.seeded = parse_env_bool("LOADCORE_SEEDED", &raw)?;
        }
        if let Some(raw) = lookup("LOADCORE_LOG_ENABLED") {
            self.logging.enabled = parse_env_bool("LOADCORE_LOG_ENABLED", &raw)?;
        }
        if let Some(raw) = lookup("LOADCORE_JSONL_PATH") {
            self.logging.jsonl_path = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Reject values the engine would refuse later anyway.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency.threads == 0 {
            return Err(LoadError::invalid_config(
                "concurrency.threads must be >= 1",
            ));
        }
        if self.concurrency.timeout_secs == 0 {
            return Err(LoadError::invalid_config(
                "concurrency.timeout_secs must be >= 1",
            ));
        }
        if self.logging.enabled && self.logging.jsonl_path.as_os_str().is_empty() {
            return Err(LoadError::invalid_config(
                "logging.jsonl_path must be set when logging is enabled",
            ));
        }
        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| LoadError::invalid_config(format!("{name} has invalid value {raw:?}")))
}

fn parse_env_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoadError::invalid_config(format!(
            "{name} must be a boolean, got {raw:?}"
        ))),
    }
}
