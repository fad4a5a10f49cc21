//! `tracing` integration
//!
//! Events recorded through the `tracing` macros can be copied into the
//! leveled logs at one chosen severity, with the event's own file and line in
//! the header.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing::Metadata;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::Layer;

use crate::error::ConfigError;
use crate::router::{inside_logger, Logger};
use crate::severity::Severity;

/// Module recorded when an event carries no source file
const UNKNOWN_MODULE: &str = "???";

/// Writer factory that turns formatted `tracing` events into log records
#[derive(Debug, Clone)]
pub struct StandardLogWriter {
    logger: Logger,
    severity: Severity,
}

impl StandardLogWriter {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    fn writer_at(&self, module: &str, line: u32) -> BridgeWriter {
        BridgeWriter {
            logger: self.logger.clone(),
            severity: self.severity,
            module: module.to_string(),
            line,
            buf: Vec::new(),
        }
    }
}

/// Route `tracing` output to the severity named `name`
///
/// Names are matched case-insensitively; anything but INFO, WARNING, ERROR or
/// FATAL is rejected with the offending name in the error.
pub fn copy_standard_log_to(logger: &Logger, name: &str) -> std::result::Result<StandardLogWriter, ConfigError> {
    let severity = name.parse::<Severity>()?;
    Ok(StandardLogWriter {
        logger: logger.clone(),
        severity,
    })
}

/// Buffers one formatted event and emits it as a single record on drop
pub struct BridgeWriter {
    logger: Logger,
    severity: Severity,
    module: String,
    line: u32,
    buf: Vec<u8>,
}

impl Write for BridgeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for BridgeWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        // Diagnostics raised while the logger holds its lock cannot re-enter it.
        if inside_logger() {
            let _ = io::stderr().write_all(&self.buf);
            return;
        }
        let text = String::from_utf8_lossy(&self.buf);
        let message = text.trim_end_matches('\n');
        self.logger
            .output(self.severity, &self.module, self.line, message);
    }
}

impl<'a> MakeWriter<'a> for StandardLogWriter {
    type Writer = BridgeWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.writer_at(UNKNOWN_MODULE, 0)
    }

    fn make_writer_for(&'a self, meta: &Metadata<'_>) -> Self::Writer {
        self.writer_at(meta.file().unwrap_or(UNKNOWN_MODULE), meta.line().unwrap_or(0))
    }
}

/// fmt layer writing bare messages through `writer`
///
/// Time, level and target are left out since the record header carries them.
pub fn bridge_layer<S>(writer: StandardLogWriter) -> impl Layer<S>
where
    S: tracing::Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .without_time()
        .with_level(false)
        .with_target(false)
}

/// Writer for the severity named by the configured `standard_log_target`
pub fn configured_standard_log_writer(logger: &Logger) -> Option<StandardLogWriter> {
    logger.standard_log_target().map(|severity| StandardLogWriter {
        logger: logger.clone(),
        severity,
    })
}

/// Install a global subscriber that copies `tracing` events to `logger`
///
/// Events go to the configured `standard_log_target`. Without one nothing is
/// installed and `false` is returned. Filtering follows `RUST_LOG`,
/// defaulting to info.
pub fn install_standard_log_bridge(logger: &Logger) -> Result<bool> {
    let Some(writer) = configured_standard_log_writer(logger) else {
        return Ok(false);
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(bridge_layer(writer))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(true)
}
