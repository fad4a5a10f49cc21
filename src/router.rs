//! Severity routing
//!
//! `Logger` is the owned logging context: it gates debug calls, formats each
//! record once and writes it to the sink of its severity and to every less
//! severe sink. All sink state sits behind one mutex so that measuring,
//! rotating and writing happen as a unit for each record.

use std::backtrace::Backtrace;
use std::cell::Cell;
use std::fmt;
use std::io::{self, ErrorKind, Write};
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Local};

use crate::config::{LogConfig, ModuleOverrideSpec, RotationPolicy};
use crate::error::{ConfigError, Result};
use crate::file_name::LogIdentity;
use crate::header::HeaderFormatter;
use crate::retention::{RetentionSweeper, SweepReport};
use crate::severity::{Severity, NUM_SEVERITY};
use crate::sink::{RotatingSink, SinkLayout};
use crate::verbosity::VerbosityGate;

/// Source of record timestamps
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

/// Called with the record after a fatal record has been written and flushed
pub type TerminateHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Called for every I/O failure while writing a record
pub type FailureHook = Arc<dyn Fn(&io::Error) + Send + Sync>;

thread_local! {
    static IN_LOGGER: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the exclusive section
struct ReentryGuard {
    previous: bool,
}

impl ReentryGuard {
    fn enter() -> Self {
        Self {
            previous: IN_LOGGER.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        IN_LOGGER.with(|flag| flag.set(self.previous));
    }
}

/// Whether this thread is already writing through a logger
pub(crate) fn inside_logger() -> bool {
    IN_LOGGER.with(Cell::get)
}

/// `file:line` that gets a stack trace appended to its Info output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLocation {
    file: String,
    line: u32,
}

impl TraceLocation {
    fn matches(&self, module: &str, line: u32) -> bool {
        line == self.line
            && (module == self.file
                || module
                    .strip_suffix(self.file.as_str())
                    .map_or(false, |head| head.ends_with('/')))
    }
}

impl FromStr for TraceLocation {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidTraceLocation(s.to_string());
        let (file, line) = s.rsplit_once(':').ok_or_else(invalid)?;
        let line = line.parse().map_err(|_| invalid())?;
        if file.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            file: file.to_string(),
            line,
        })
    }
}

struct Inner {
    gate: VerbosityGate,
    layout: SinkLayout,
    sinks: Mutex<[RotatingSink; NUM_SEVERITY]>,
    trace_location: ArcSwapOption<TraceLocation>,
    only_stderr: bool,
    also_stderr: bool,
    stderr_threshold: Severity,
    standard_log_target: Option<Severity>,
    clock: Clock,
    terminate: TerminateHandler,
    failure: FailureHook,
}

/// Builds a `Logger` with optional test seams
pub struct LoggerBuilder {
    config: LogConfig,
    identity: Option<LogIdentity>,
    pid: Option<u32>,
    clock: Option<Clock>,
    terminate: Option<TerminateHandler>,
    failure: Option<FailureHook>,
}

impl LoggerBuilder {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config,
            identity: None,
            pid: None,
            clock: None,
            terminate: None,
            failure: None,
        }
    }

    /// Override the program/host/user used in file names
    pub fn identity(mut self, identity: LogIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    pub fn clock(mut self, clock: impl Fn() -> DateTime<Local> + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Replace the default flush-then-exit behaviour of fatal records
    pub fn terminate_handler(mut self, handler: impl Fn(&[u8]) + Send + Sync + 'static) -> Self {
        self.terminate = Some(Arc::new(handler));
        self
    }

    /// Replace the default report-then-exit behaviour on write failures
    pub fn failure_hook(mut self, hook: impl Fn(&io::Error) + Send + Sync + 'static) -> Self {
        self.failure = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and build the logger
    pub fn build(self) -> Result<Logger> {
        let config = self.config;
        let gate = VerbosityGate::new(config.verbosity, &config.module_overrides)?;
        let trace_location = config
            .trace_location
            .as_deref()
            .map(TraceLocation::from_str)
            .transpose()?;
        let standard_log_target = config
            .standard_log_target
            .as_deref()
            .map(Severity::from_str)
            .transpose()?;

        let identity = self
            .identity
            .unwrap_or_else(|| LogIdentity::detect(config.program.as_deref()));
        let pid = self.pid.unwrap_or_else(std::process::id);
        let layout = SinkLayout {
            dirs: config.effective_log_dirs(),
            identity,
            policy: config.rotation_policy(),
            formatter: HeaderFormatter::new(pid, config.build_roots.clone()),
        };

        let inner = Inner {
            gate,
            layout,
            sinks: Mutex::new(Severity::ALL.map(RotatingSink::new)),
            trace_location: ArcSwapOption::from(trace_location.map(Arc::new)),
            only_stderr: config.only_log_to_stderr,
            also_stderr: config.also_log_to_stderr,
            stderr_threshold: config.stderr_threshold,
            standard_log_target,
            clock: self.clock.unwrap_or_else(|| Arc::new(Local::now)),
            terminate: self.terminate.unwrap_or_else(|| Arc::new(default_terminate)),
            failure: self.failure.unwrap_or_else(|| Arc::new(default_failure)),
        };
        Ok(Logger {
            inner: Arc::new(inner),
        })
    }
}

fn default_terminate(_record: &[u8]) {
    let _ = io::stderr().flush();
    std::process::exit(255);
}

fn default_failure(err: &io::Error) {
    let _ = writeln!(io::stderr(), "log: exiting because of error: {}", err);
    std::process::exit(2);
}

fn capture_stack() -> String {
    let mut trace = Backtrace::force_capture().to_string();
    if !trace.ends_with('\n') {
        trace.push('\n');
    }
    trace
}

/// Leveled, severity-cascading logging context
///
/// Cloning is cheap and every clone writes to the same files.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<Inner>,
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("identity", &self.inner.layout.identity)
            .field("dirs", &self.inner.layout.dirs)
            .field("verbosity", &self.inner.gate.global_level())
            .finish()
    }
}

impl Logger {
    /// Build a logger with the default clock, pid and handlers
    pub fn new(config: LogConfig) -> Result<Self> {
        LoggerBuilder::new(config).build()
    }

    pub fn builder(config: LogConfig) -> LoggerBuilder {
        LoggerBuilder::new(config)
    }

    pub fn identity(&self) -> &LogIdentity {
        &self.inner.layout.identity
    }

    pub fn policy(&self) -> &RotationPolicy {
        &self.inner.layout.policy
    }

    /// Severity named by the configuration for bridged `tracing` output
    pub fn standard_log_target(&self) -> Option<Severity> {
        self.inner.standard_log_target
    }

    /// Handle bound to the source file `module`
    pub fn module(&self, module: impl Into<String>) -> ModuleLogger {
        ModuleLogger {
            logger: self.clone(),
            module: Arc::from(module.into()),
        }
    }

    /// Handle bound to the caller's source file
    #[track_caller]
    pub fn here(&self) -> ModuleLogger {
        self.module(Location::caller().file())
    }

    pub fn verbosity(&self) -> u32 {
        self.inner.gate.global_level()
    }

    pub fn set_verbosity(&self, level: u32) {
        self.inner.gate.set_global_level(level);
    }

    /// Replace all module overrides; nothing changes if any pattern is invalid
    pub fn set_module_overrides(&self, overrides: &[ModuleOverrideSpec]) -> Result<()> {
        self.inner.gate.set_overrides(overrides)
    }

    /// Set or clear the `file:line` that gets stack traces
    pub fn set_trace_location(&self, location: Option<&str>) -> Result<()> {
        let parsed = location.map(TraceLocation::from_str).transpose()?;
        self.inner.trace_location.store(parsed.map(Arc::new));
        Ok(())
    }

    /// Whether a debug call at `level` from `module` would be emitted
    pub fn allows(&self, level: u32, module: &str) -> bool {
        level == 0 || self.inner.gate.allows(level, module)
    }

    /// Gate, format and write one record
    ///
    /// Level 0 is an ordinary call and is always emitted.
    pub fn emit(&self, severity: Severity, level: u32, module: &str, line: u32, message: &str) {
        if !self.allows(level, module) {
            return;
        }
        self.output(severity, module, line, message);
    }

    /// Format and write one record without gating
    pub(crate) fn output(&self, severity: Severity, module: &str, line: u32, message: &str) {
        let inner = &*self.inner;
        let now = (inner.clock)();
        let record = inner.layout.formatter.format(severity, &now, module, line, message);

        if inside_logger() {
            let _ = io::stderr().write_all(&record);
            return;
        }

        let traced = inner
            .trace_location
            .load()
            .as_ref()
            .map_or(false, |loc| loc.matches(module, line));
        let with_stack = if severity == Severity::Fatal || traced {
            Some([record.as_slice(), capture_stack().as_bytes()].concat())
        } else {
            None
        };
        let (info_bytes, other_bytes): (&[u8], &[u8]) = match &with_stack {
            Some(full) if severity == Severity::Fatal => (full, full),
            Some(full) => (full, &record),
            None => (&record, &record),
        };

        if inner.only_stderr {
            let bytes = if severity == Severity::Info { info_bytes } else { other_bytes };
            let _ = io::stderr().write_all(bytes);
        } else {
            if inner.also_stderr || severity >= inner.stderr_threshold {
                let _ = io::stderr().write_all(&record);
            }
            self.write_sinks(severity, &now, info_bytes, other_bytes);
        }

        if severity == Severity::Fatal {
            let _ = io::stderr().flush();
            (inner.terminate)(&record);
        }
    }

    fn write_sinks(&self, severity: Severity, now: &DateTime<Local>, info_bytes: &[u8], other_bytes: &[u8]) {
        let inner = &*self.inner;
        let mut failures = Vec::new();
        {
            let _reentry = ReentryGuard::enter();
            let mut sinks = inner.sinks.lock().unwrap_or_else(PoisonError::into_inner);
            let mut rotated_dirs: Vec<PathBuf> = Vec::new();
            let mut fell_back = false;

            for tier in std::iter::once(severity).chain(severity.lower().iter().copied()) {
                let bytes = if tier == Severity::Info { info_bytes } else { other_bytes };
                let sink = &mut sinks[tier.index()];
                match sink.write(&inner.layout, bytes, now) {
                    Ok(true) => {
                        if let Some(dir) = sink.active_path().and_then(Path::parent) {
                            if !rotated_dirs.iter().any(|d| d == dir) {
                                rotated_dirs.push(dir.to_path_buf());
                            }
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        if !fell_back {
                            let _ = io::stderr().write_all(other_bytes);
                            fell_back = true;
                        }
                        failures.push(e);
                    }
                }
            }

            if !rotated_dirs.is_empty() && inner.layout.policy.has_retention() {
                let active = active_paths(&sinks[..]);
                for dir in &rotated_dirs {
                    if let Err(e) = self.sweep_dir(dir, now, &active) {
                        tracing::warn!(dir = %dir.display(), error = %e, "Log retention sweep failed");
                    }
                }
            }

            if severity == Severity::Fatal {
                for sink in sinks.iter_mut() {
                    if let Err(e) = sink.flush() {
                        failures.push(e);
                    }
                }
            }
        }

        for e in &failures {
            (inner.failure)(e);
        }
    }

    fn sweep_dir(&self, dir: &Path, now: &DateTime<Local>, active: &[PathBuf]) -> io::Result<SweepReport> {
        let layout = &self.inner.layout;
        RetentionSweeper::new(dir, &layout.identity, &layout.policy).sweep(now, active)
    }

    /// Run a retention pass over every configured directory now
    pub fn sweep_now(&self) -> io::Result<Vec<SweepReport>> {
        let inner = &*self.inner;
        let now = (inner.clock)();
        let _reentry = ReentryGuard::enter();
        let sinks = inner.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        let active = active_paths(&sinks[..]);

        let mut reports = Vec::new();
        for dir in &inner.layout.dirs {
            match self.sweep_dir(dir, &now, &active) {
                Ok(report) => reports.push(report),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reports)
    }

    /// Files currently receiving writes, one per opened severity
    pub fn active_files(&self) -> Vec<PathBuf> {
        let sinks = self.inner.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        active_paths(&sinks[..])
    }

    /// Make every accepted record durable
    pub fn flush(&self) -> io::Result<()> {
        let mut sinks = self.inner.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut result = Ok(());
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.flush() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        let _ = io::stderr().flush();
        result
    }

    /// Flush and close all files; later records open new ones
    pub fn close(&self) -> io::Result<()> {
        let mut sinks = self.inner.sinks.lock().unwrap_or_else(PoisonError::into_inner);
        let mut result = Ok(());
        for sink in sinks.iter_mut() {
            if let Err(e) = sink.close() {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

fn active_paths(sinks: &[RotatingSink]) -> Vec<PathBuf> {
    sinks
        .iter()
        .filter_map(|s| s.active_path().map(Path::to_path_buf))
        .collect()
}

/// Logger handle bound to one source file
///
/// Line numbers come from the call site.
#[derive(Clone, Debug)]
pub struct ModuleLogger {
    logger: Logger,
    module: Arc<str>,
}

impl ModuleLogger {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    #[track_caller]
    pub fn log(&self, severity: Severity, message: impl fmt::Display) {
        let line = Location::caller().line();
        self.logger
            .output(severity, &self.module, line, &message.to_string());
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        self.log(Severity::Info, message);
    }

    #[track_caller]
    pub fn warning(&self, message: impl fmt::Display) {
        self.log(Severity::Warning, message);
    }

    #[track_caller]
    pub fn error(&self, message: impl fmt::Display) {
        self.log(Severity::Error, message);
    }

    /// Log, flush everything and run the terminate handler
    #[track_caller]
    pub fn fatal(&self, message: impl fmt::Display) {
        self.log(Severity::Fatal, message);
    }

    /// Debug output at `level`, emitted only if the gate allows it
    pub fn v(&self, level: u32) -> Verbose<'_> {
        Verbose {
            handle: self,
            enabled: self.logger.allows(level, &self.module),
        }
    }
}

/// Result of a verbosity check, bound to its handle
#[derive(Debug)]
pub struct Verbose<'a> {
    handle: &'a ModuleLogger,
    enabled: bool,
}

impl Verbose<'_> {
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[track_caller]
    pub fn info(&self, message: impl fmt::Display) {
        if self.enabled {
            self.handle.log(Severity::Info, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::resolve_pointer;
    use chrono::NaiveDate;
    use std::fs;
    use tempfile::TempDir;

    const THIS_FILE: &str = "src/router.rs";

    fn frozen_time() -> DateTime<Local> {
        NaiveDate::from_ymd_opt(2006, 1, 2)
            .unwrap()
            .and_hms_micro_opt(15, 4, 5, 67890)
            .unwrap()
            .and_local_timezone(Local)
            .unwrap()
    }

    fn config(dir: &Path) -> LogConfig {
        LogConfig {
            log_dirs: vec![dir.to_path_buf()],
            stderr_threshold: Severity::Fatal,
            ..LogConfig::default()
        }
    }

    fn build(config: LogConfig) -> Logger {
        Logger::builder(config)
            .identity(LogIdentity::new("prog", "host", "user"))
            .pid(1234)
            .clock(frozen_time)
            .terminate_handler(|_| {})
            .failure_hook(|e| panic!("unexpected log failure: {e}"))
            .build()
            .unwrap()
    }

    /// Records written to the current file of `severity`, banner removed
    fn contents(dir: &Path, severity: Severity) -> String {
        let pointer = format!("prog.{}", severity.name());
        let Some(target) = resolve_pointer(dir, &pointer) else {
            return String::new();
        };
        let content = fs::read_to_string(dir.join(target)).unwrap();
        match content.split_once("] msg\n") {
            Some((_, records)) => records.to_string(),
            None => content,
        }
    }

    #[test]
    fn test_header() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        let log = logger.module(THIS_FILE);

        let line = line!() + 1;
        log.info("test");

        assert_eq!(
            contents(temp.path(), Severity::Info),
            format!("I0102 15:04:05.067890 1234 src/router.rs:{}] test\n", line)
        );
    }

    #[test]
    fn test_here_uses_caller_file() {
        let logger = build(config(Path::new("/nonexistent")));
        assert!(logger.here().module().ends_with("router.rs"));
    }

    #[test]
    fn test_info_only_in_info() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        logger.module(THIS_FILE).info("test");

        assert!(contents(temp.path(), Severity::Info).starts_with('I'));
        assert!(contents(temp.path(), Severity::Warning).is_empty());
        assert!(contents(temp.path(), Severity::Error).is_empty());
    }

    #[test]
    fn test_warning_cascades_to_info() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        logger.module(THIS_FILE).warning("test");

        let warning = contents(temp.path(), Severity::Warning);
        assert!(warning.starts_with('W'));
        assert!(warning.contains("test"));
        assert_eq!(contents(temp.path(), Severity::Info), warning);
        assert!(contents(temp.path(), Severity::Error).is_empty());
    }

    #[test]
    fn test_error_cascades_to_warning_and_info() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        logger.module(THIS_FILE).error("x");

        let error = contents(temp.path(), Severity::Error);
        assert!(error.starts_with('E'));
        assert!(error.ends_with("] x\n"));
        assert_eq!(contents(temp.path(), Severity::Warning), error);
        assert_eq!(contents(temp.path(), Severity::Info), error);
        assert!(contents(temp.path(), Severity::Fatal).is_empty());
    }

    #[test]
    fn test_v_logs_to_info() {
        let temp = TempDir::new().unwrap();
        let logger = build(LogConfig {
            verbosity: 2,
            ..config(temp.path())
        });
        let log = logger.module(THIS_FILE);
        log.v(2).info("test");
        log.v(3).info("hidden");

        let info = contents(temp.path(), Severity::Info);
        assert!(info.starts_with('I'));
        assert!(info.contains("test"));
        assert!(!info.contains("hidden"));
    }

    #[test]
    fn test_module_override_on() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        logger
            .set_module_overrides(&[ModuleOverrideSpec::new("router.rs", 2)])
            .unwrap();
        let log = logger.module(THIS_FILE);

        assert!(log.v(1).enabled());
        assert!(log.v(2).enabled());
        assert!(!log.v(3).enabled());
        log.v(2).info("test");
        assert!(contents(temp.path(), Severity::Info).contains("test"));
    }

    #[test]
    fn test_module_override_off() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        logger
            .set_module_overrides(&[ModuleOverrideSpec::new("notthisfile", 2)])
            .unwrap();
        let log = logger.module(THIS_FILE);

        for level in 1..=3 {
            assert!(!log.v(level).enabled(), "enabled for {level}");
        }
        log.v(2).info("test");
        assert!(logger.active_files().is_empty());
        assert!(contents(temp.path(), Severity::Info).is_empty());
    }

    #[test]
    fn test_emit_gates_debug_levels_only() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        logger.emit(Severity::Warning, 0, THIS_FILE, 7, "plain");
        logger.emit(Severity::Info, 1, THIS_FILE, 8, "debug");

        let info = contents(temp.path(), Severity::Info);
        assert!(info.contains("router.rs:7] plain"));
        assert!(!info.contains("debug"));
    }

    #[test]
    fn test_invalid_configuration_is_rejected() {
        let base = LogConfig::default;
        assert!(Logger::new(LogConfig {
            module_overrides: vec![ModuleOverrideSpec::new("a*", 1)],
            ..base()
        })
        .is_err());
        assert!(Logger::new(LogConfig {
            trace_location: Some("router.rs".to_string()),
            ..base()
        })
        .is_err());
        assert!(Logger::new(LogConfig {
            standard_log_target: Some("LOG".to_string()),
            ..base()
        })
        .is_err());
    }

    #[test]
    fn test_trace_location_appends_stack_to_info_only() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        let log = logger.module(THIS_FILE);

        let line = line!() + 2;
        logger.set_trace_location(Some(&format!("router.rs:{}", line))).unwrap();
        log.error("we want a stack trace here");

        let error = contents(temp.path(), Severity::Error);
        let info = contents(temp.path(), Severity::Info);
        assert_eq!(error.lines().count(), 1);
        assert!(info.starts_with(&error));
        assert!(info.len() > error.len());
        assert_eq!(contents(temp.path(), Severity::Warning), error);
    }

    #[test]
    fn test_trace_location_parsing() {
        let loc: TraceLocation = "router.rs:42".parse().unwrap();
        assert!(loc.matches("src/router.rs", 42));
        assert!(loc.matches("router.rs", 42));
        assert!(!loc.matches("src/my_router.rs", 42));
        assert!(!loc.matches("src/router.rs", 43));
        assert!("router.rs:x".parse::<TraceLocation>().is_err());
        assert!(":12".parse::<TraceLocation>().is_err());
    }

    #[test]
    fn test_fatal_runs_terminate_handler() {
        let temp = TempDir::new().unwrap();
        let terminated = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&terminated);
        let logger = Logger::builder(config(temp.path()))
            .identity(LogIdentity::new("prog", "host", "user"))
            .clock(frozen_time)
            .terminate_handler(move |record| seen.lock().unwrap().push(record.to_vec()))
            .build()
            .unwrap();

        logger.module(THIS_FILE).fatal("boom");

        let records = terminated.lock().unwrap();
        assert_eq!(records.len(), 1);
        let record = String::from_utf8(records[0].clone()).unwrap();
        assert!(record.starts_with('F'));
        assert!(record.ends_with("] boom\n"));

        for severity in Severity::ALL {
            let content = contents(temp.path(), severity);
            assert!(content.starts_with(&record), "{severity} missing fatal record");
            assert!(content.len() > record.len(), "{severity} missing stack");
        }
    }

    #[test]
    fn test_write_failure_reaches_hook() {
        let temp = TempDir::new().unwrap();
        let failures = Arc::new(Mutex::new(0));
        let count = Arc::clone(&failures);
        let logger = Logger::builder(config(&temp.path().join("absent")))
            .identity(LogIdentity::new("prog", "host", "user"))
            .failure_hook(move |_| *count.lock().unwrap() += 1)
            .build()
            .unwrap();

        logger.module(THIS_FILE).warning("lost?");
        assert_eq!(*failures.lock().unwrap(), 2);
    }

    #[test]
    fn test_only_stderr_writes_no_files() {
        let temp = TempDir::new().unwrap();
        let logger = build(LogConfig {
            only_log_to_stderr: true,
            ..config(temp.path())
        });
        logger.module(THIS_FILE).error("to stderr");
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_rotation_and_sweep_through_logger() {
        let temp = TempDir::new().unwrap();
        let logger = build(LogConfig {
            max_size: 1024,
            max_total_size: 4 * 1024,
            ..config(temp.path())
        });
        let log = logger.module(THIS_FILE);
        for i in 0..200 {
            log.info(format!("record {i} {}", "x".repeat(40)));
        }
        logger.flush().unwrap();

        let prefix = logger.identity().prefix();
        let mut rotated_total = 0;
        let active = logger.active_files();
        for entry in fs::read_dir(temp.path()).unwrap() {
            let entry = entry.unwrap();
            let name = entry.file_name().into_string().unwrap();
            if name.starts_with(&prefix) && !active.contains(&entry.path()) {
                rotated_total += entry.metadata().unwrap().len();
            }
        }
        assert!(rotated_total <= 4 * 1024);
        assert!(contents(temp.path(), Severity::Info).contains("record 199"));
    }

    #[test]
    fn test_concurrent_writers_keep_records_whole() {
        let temp = TempDir::new().unwrap();
        let logger = build(LogConfig {
            max_size: 4096,
            ..config(temp.path())
        });

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let log = logger.module(THIS_FILE);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        log.info(format!("worker {worker} record {i}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        logger.flush().unwrap();

        let mut records = 0;
        for entry in fs::read_dir(temp.path()).unwrap() {
            let entry = entry.unwrap();
            let meta = fs::symlink_metadata(entry.path()).unwrap();
            if !meta.is_file() {
                continue;
            }
            let content = fs::read_to_string(entry.path()).unwrap();
            assert!(content.len() as u64 <= 4096 + 200);
            for line in content.lines().filter(|l| l.starts_with('I')) {
                assert!(line.contains("] worker "), "torn record: {line}");
                records += 1;
            }
        }
        assert_eq!(records, 8 * 200);
    }

    #[test]
    fn test_close_then_write_opens_new_file() {
        let temp = TempDir::new().unwrap();
        let logger = build(config(temp.path()));
        let log = logger.module(THIS_FILE);
        log.info("first");
        let first = logger.active_files();
        logger.close().unwrap();
        assert!(logger.active_files().is_empty());

        log.info("second");
        assert_ne!(logger.active_files(), first);
        assert!(fs::read_to_string(&first[0]).unwrap().contains("first"));
    }

    #[test]
    fn test_sweep_now() {
        let temp = TempDir::new().unwrap();
        let logger = build(LogConfig {
            max_age_secs: 3600,
            ..config(temp.path())
        });
        let stale = logger
            .identity()
            .file_name(Severity::Info, &(frozen_time() - chrono::Duration::days(2)).naive_local(), 1);
        fs::write(temp.path().join(&stale), "old").unwrap();
        logger.module(THIS_FILE).info("fresh");

        let reports = logger.sweep_now().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].deleted, vec![stale]);
        assert!(contents(temp.path(), Severity::Info).contains("fresh"));
    }
}
