//! tierlog - leveled, severity-cascading file logging
//!
//! Records carry one of four severities. Each severity has its own file and a
//! record is written to its own file and to every less severe one, so the INFO
//! file holds everything. Debug output is gated by a global verbosity level
//! and per-module overrides; files rotate by size or calendar interval and old
//! generations are aged out, trimmed to a size budget or gzipped.
//!
//! ```no_run
//! use tierlog::{LogConfig, Logger};
//!
//! let logger = Logger::new(LogConfig::default())?;
//! let log = logger.here();
//! log.info("starting");
//! log.v(2).info("chatty detail");
//! logger.flush()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod file_name;
pub mod header;
pub mod retention;
pub mod router;
pub mod severity;
pub mod sink;
pub mod verbosity;

pub use bridge::{
    configured_standard_log_writer, copy_standard_log_to, install_standard_log_bridge, StandardLogWriter,
};
pub use config::{parse_interval, Interval, LogConfig, ModuleOverrideSpec, RotationPolicy};
pub use error::ConfigError;
pub use file_name::{extract_timestamp, LogIdentity};
pub use retention::SweepReport;
pub use router::{Logger, LoggerBuilder, ModuleLogger, Verbose};
pub use severity::Severity;
pub use verbosity::compile_module_pattern;
