//! Per-severity rotating log files
//!
//! A sink starts closed, opens its first file lazily on the first write and
//! replaces that file with a new generation whenever the rotation policy
//! says so. After every open the severity's "current" pointer is moved to
//! the new file.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike};

use crate::config::{Interval, RotationPolicy};
use crate::file_name::LogIdentity;
use crate::header::HeaderFormatter;
use crate::severity::Severity;

/// Upper bound on same-second name collisions tried before giving up
const MAX_DISAMBIGUATION: u32 = 1000;

/// Where and how sinks create their files
#[derive(Debug, Clone)]
pub struct SinkLayout {
    /// Candidate directories, first one that accepts the file wins
    pub dirs: Vec<PathBuf>,
    pub identity: LogIdentity,
    pub policy: RotationPolicy,
    pub formatter: HeaderFormatter,
}

/// First wall-clock boundary strictly after `created`
pub fn next_boundary(created: NaiveDateTime, interval: Interval) -> Option<NaiveDateTime> {
    let date = created.date();
    let boundary = match interval {
        Interval::Never => return None,
        Interval::Hourly => date.and_hms_opt(created.hour(), 0, 0)? + Duration::hours(1),
        Interval::Daily => date.succ_opt()?.and_hms_opt(0, 0, 0)?,
        Interval::Weekly => {
            let days = 7 - i64::from(date.weekday().num_days_from_monday());
            (date + Duration::days(days)).and_hms_opt(0, 0, 0)?
        }
        Interval::Monthly => {
            let (year, month) = if date.month() == 12 {
                (date.year() + 1, 1)
            } else {
                (date.year(), date.month() + 1)
            };
            NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?
        }
    };
    Some(boundary)
}

/// Rotation decision for a file holding `bytes_written` bytes
///
/// An active interval takes precedence; size limits only apply when the
/// interval is `Never`. `min_size` is a floor below which size-based
/// rotation never fires.
pub fn rotation_due<Tz: TimeZone>(
    policy: &RotationPolicy,
    bytes_written: u64,
    created: &DateTime<Tz>,
    pending_len: usize,
    now: &DateTime<Tz>,
) -> bool {
    if policy.interval != Interval::Never {
        return next_boundary(created.naive_local(), policy.interval)
            .map_or(false, |boundary| now.naive_local() >= boundary);
    }
    if policy.max_size > 0 {
        return bytes_written >= policy.min_size
            && bytes_written.saturating_add(pending_len as u64) > policy.max_size;
    }
    false
}

#[derive(Debug)]
struct OpenFile {
    writer: BufWriter<File>,
    path: PathBuf,
    bytes_written: u64,
    created: DateTime<Local>,
}

/// Log file state for one severity
#[derive(Debug)]
pub struct RotatingSink {
    severity: Severity,
    file: Option<OpenFile>,
}

impl RotatingSink {
    pub fn new(severity: Severity) -> Self {
        Self {
            severity,
            file: None,
        }
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Path of the file currently receiving writes
    pub fn active_path(&self) -> Option<&Path> {
        self.file.as_ref().map(|f| f.path.as_path())
    }

    /// Bytes in the current generation, banner included
    pub fn bytes_written(&self) -> u64 {
        self.file.as_ref().map_or(0, |f| f.bytes_written)
    }

    /// Whether writing `pending_len` more bytes at `now` must go to a new file
    pub fn should_rotate(&self, policy: &RotationPolicy, pending_len: usize, now: &DateTime<Local>) -> bool {
        match &self.file {
            Some(file) => rotation_due(policy, file.bytes_written, &file.created, pending_len, now),
            None => false,
        }
    }

    /// Append one record, opening or rotating the file first when needed
    ///
    /// Returns true when an older generation was closed by this call.
    pub fn write(&mut self, layout: &SinkLayout, record: &[u8], now: &DateTime<Local>) -> io::Result<bool> {
        let rotate = self.should_rotate(&layout.policy, record.len(), now);
        if self.file.is_none() || rotate {
            self.open_generation(layout, now)?;
        }

        let Some(file) = self.file.as_mut() else {
            return Err(io::Error::new(ErrorKind::Other, "log file is not open"));
        };
        file.writer.write_all(record)?;
        file.writer.flush()?;
        file.bytes_written += record.len() as u64;
        Ok(rotate)
    }

    /// Push buffered bytes to the OS and fsync them
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.writer.flush()?;
            file.writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Flush and close the current file; the next write opens a new one
    pub fn close(&mut self) -> io::Result<()> {
        let result = self.flush();
        self.file = None;
        result
    }

    fn open_generation(&mut self, layout: &SinkLayout, now: &DateTime<Local>) -> io::Result<()> {
        if self.file.is_some() {
            self.close()?;
        }

        let mut last_err = io::Error::new(ErrorKind::NotFound, "no log directory configured");
        for dir in &layout.dirs {
            match create_log_file(dir, &layout.identity, self.severity, now, layout.formatter.pid()) {
                Ok((file, path)) => {
                    let mut writer = BufWriter::new(file);
                    let banner = layout.formatter.file_banner(&layout.identity, now);
                    writer.write_all(&banner)?;
                    writer.flush()?;

                    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                        let pointer = layout.identity.pointer_name(self.severity);
                        if let Err(e) = repoint(dir, &pointer, name) {
                            tracing::debug!(pointer = %pointer, error = %e, "Failed to update current log pointer");
                        }
                    }

                    tracing::debug!(path = %path.display(), severity = %self.severity, "Opened log file");
                    self.file = Some(OpenFile {
                        writer,
                        path,
                        bytes_written: banner.len() as u64,
                        created: *now,
                    });
                    return Ok(());
                }
                Err(e) => last_err = e,
            }
        }
        Err(last_err)
    }
}

/// Create a fresh file, bumping the disambiguator past existing names
fn create_log_file(
    dir: &Path,
    identity: &LogIdentity,
    severity: Severity,
    now: &DateTime<Local>,
    pid: u32,
) -> io::Result<(File, PathBuf)> {
    let time = now.naive_local();
    let mut disambiguator = pid;
    for _ in 0..MAX_DISAMBIGUATION {
        let path = dir.join(identity.file_name(severity, &time, disambiguator));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                disambiguator = disambiguator.wrapping_add(1);
            }
            Err(e) => return Err(e),
        }
    }
    Err(io::Error::new(
        ErrorKind::AlreadyExists,
        format!("log: no free file name for {} in {}", severity, dir.display()),
    ))
}

/// Point `dir/pointer` at `target` (a name in the same directory)
///
/// The old pointer is removed before the new one is made, so readers may
/// briefly find none but never a stale one.
pub fn repoint(dir: &Path, pointer: &str, target: &str) -> io::Result<()> {
    let link = dir.join(pointer);
    match fs::remove_file(&link) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, &link)
    }

    // Without symlinks the pointer is a small file holding the target name.
    #[cfg(not(unix))]
    {
        fs::write(&link, target)
    }
}

/// Name of the file `dir/pointer` refers to, if any
pub fn resolve_pointer(dir: &Path, pointer: &str) -> Option<String> {
    let link = dir.join(pointer);
    let meta = fs::symlink_metadata(&link).ok()?;
    if meta.file_type().is_symlink() {
        let target = fs::read_link(&link).ok()?;
        return target.file_name()?.to_str().map(str::to_string);
    }
    if meta.is_file() && meta.len() < 4096 {
        let content = fs::read_to_string(&link).ok()?;
        let name = content.trim();
        if !name.is_empty() && !name.contains('/') {
            return Some(name.to_string());
        }
    }
    None
}
