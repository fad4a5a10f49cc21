//! Severity tiers
//!
//! Records cascade downwards: a record at tier S is written to the sink for S
//! and to every less severe sink.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Ordered logging urgency tier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
}

/// Number of severity tiers
pub const NUM_SEVERITY: usize = 4;

impl Severity {
    /// All tiers in ascending order
    pub const ALL: [Severity; NUM_SEVERITY] = [
        Severity::Info,
        Severity::Warning,
        Severity::Error,
        Severity::Fatal,
    ];

    /// Upper-case name used in file names and configuration
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
        }
    }

    /// Leading character of the header line
    pub fn as_char(&self) -> char {
        match self {
            Severity::Info => 'I',
            Severity::Warning => 'W',
            Severity::Error => 'E',
            Severity::Fatal => 'F',
        }
    }

    /// Slot index of this tier
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Tiers strictly less severe than this one, ascending
    pub fn lower(&self) -> &'static [Severity] {
        &Self::ALL[..self.index()]
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Severity {
    type Err = ConfigError;

    /// Accepts exactly INFO, WARNING, ERROR or FATAL (case-insensitive)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|sev| sev.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::InvalidSeverity(s.to_string()))
    }
}

impl TryFrom<String> for Severity {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, ConfigError> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(sev: Severity) -> Self {
        sev.name().to_string()
    }
}
