//! Logger configuration
//!
//! The values here arrive already typed from whatever flag or environment
//! layer the host uses. A TOML file can also be loaded directly.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ConfigError;
use crate::severity::Severity;

/// Default size cap of a single log file (1.8 GiB)
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1800;

/// Wall-clock rotation trigger
///
/// Config files name it with the tokens `parse_interval` accepts. `Hourly`
/// has no token, so serializing it fails instead of writing a file that
/// cannot be loaded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Interval {
    #[default]
    Never,
    /// Only reachable programmatically; `parse_interval` does not accept it
    Hourly,
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Never => "never",
            Interval::Hourly => "hourly",
            Interval::Daily => "daily",
            Interval::Weekly => "weekly",
            Interval::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parse a rotation interval from a single case-insensitive token
pub fn parse_interval(value: &str) -> std::result::Result<Interval, ConfigError> {
    let interval = match value.to_ascii_lowercase().as_str() {
        "never" => Interval::Never,
        "daily" => Interval::Daily,
        "weekly" => Interval::Weekly,
        "monthly" => Interval::Monthly,
        _ => return Err(ConfigError::InvalidInterval(value.to_string())),
    };
    Ok(interval)
}

impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        parse_interval(s)
    }
}

impl TryFrom<String> for Interval {
    type Error = ConfigError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        parse_interval(&value)
    }
}

impl Serialize for Interval {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Interval::Hourly => Err(serde::ser::Error::custom(
                "hourly rotation has no config file form",
            )),
            other => serializer.serialize_str(other.as_str()),
        }
    }
}

/// Rotation and retention limits shared by every sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Size below which size-based rotation never fires
    pub min_size: u64,
    /// Size cap of one file; 0 disables size-based rotation
    pub max_size: u64,
    pub interval: Interval,
    /// Rotated files older than this are deleted; zero disables
    pub max_age: Duration,
    /// Cap on the summed size of rotated files; 0 disables
    pub max_total_size: u64,
    /// Gzip rotated files that survive retention
    pub compress: bool,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            min_size: 0,
            max_size: DEFAULT_MAX_SIZE,
            interval: Interval::Never,
            max_age: Duration::ZERO,
            max_total_size: 0,
            compress: false,
        }
    }
}

impl RotationPolicy {
    /// Whether a retention pass has anything to enforce
    pub fn has_retention(&self) -> bool {
        !self.max_age.is_zero() || self.max_total_size > 0 || self.compress
    }
}

/// One `pattern=level` verbosity override
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleOverrideSpec {
    /// Glob over `/`-separated source path segments
    pub pattern: String,
    pub level: u32,
}

impl ModuleOverrideSpec {
    pub fn new(pattern: impl Into<String>, level: u32) -> Self {
        Self {
            pattern: pattern.into(),
            level,
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Program name used in file names (default: executable stem)
    pub program: Option<String>,

    /// Global verbosity threshold
    pub verbosity: u32,

    /// Per-module verbosity thresholds
    pub module_overrides: Vec<ModuleOverrideSpec>,

    /// Candidate log directories, first writable wins (default: temp dir)
    pub log_dirs: Vec<PathBuf>,

    /// Copy every record to stderr as well as to files
    pub also_log_to_stderr: bool,

    /// Write to stderr only, never to files
    pub only_log_to_stderr: bool,

    /// Records at or above this severity are copied to stderr
    pub stderr_threshold: Severity,

    pub min_size: u64,

    pub max_size: u64,

    pub rotation_interval: Interval,

    /// Maximum age of rotated files in seconds (0 = unlimited)
    pub max_age_secs: u64,

    /// Maximum summed size of rotated files in bytes (0 = unlimited)
    pub max_total_size: u64,

    pub compress: bool,

    /// `file:line` whose Info output carries a stack trace
    pub trace_location: Option<String>,

    /// Severity that receives `tracing` output when the bridge is installed
    pub standard_log_target: Option<String>,

    /// Path prefixes stripped from module names in headers
    pub build_roots: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            program: None,
            verbosity: 0,
            module_overrides: Vec::new(),
            log_dirs: Vec::new(),
            also_log_to_stderr: false,
            only_log_to_stderr: false,
            stderr_threshold: Severity::Error,
            min_size: 0,
            max_size: DEFAULT_MAX_SIZE,
            rotation_interval: Interval::Never,
            max_age_secs: 0,
            max_total_size: 0,
            compress: false,
            trace_location: None,
            standard_log_target: None,
            build_roots: Vec::new(),
        }
    }
}

impl LogConfig {
    /// Load configuration from a TOML file, or defaults if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read log config file")?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse log config")
    }

    /// Rotation policy derived from this configuration
    pub fn rotation_policy(&self) -> RotationPolicy {
        RotationPolicy {
            min_size: self.min_size,
            max_size: self.max_size,
            interval: self.rotation_interval,
            max_age: Duration::from_secs(self.max_age_secs),
            max_total_size: self.max_total_size,
            compress: self.compress,
        }
    }

    /// Directories to try in order
    pub fn effective_log_dirs(&self) -> Vec<PathBuf> {
        if self.log_dirs.is_empty() {
            vec![std::env::temp_dir()]
        } else {
            self.log_dirs.clone()
        }
    }
}
