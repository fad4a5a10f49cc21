//! Log file retention management
//!
//! Enforces age and total-size caps on rotated-away files and optionally
//! gzips the survivors. Files of other programs, hosts or users and the
//! files behind the "current" pointers are never touched.

use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Local, NaiveDateTime};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::config::RotationPolicy;
use crate::file_name::{LogFileName, LogIdentity, GZIP_SUFFIX};
use crate::severity::Severity;
use crate::sink::resolve_pointer;

/// Outcome of one sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub compressed: Vec<String>,
    /// Files that could not be processed; the sweep went on without them
    pub failures: Vec<(String, io::Error)>,
}

#[derive(Debug)]
struct Candidate {
    name: String,
    timestamp: NaiveDateTime,
    disambiguator: u32,
    size: u64,
    compressed: bool,
}

/// Applies a rotation policy to one log directory
pub struct RetentionSweeper<'a> {
    dir: &'a Path,
    identity: &'a LogIdentity,
    policy: &'a RotationPolicy,
}

impl<'a> RetentionSweeper<'a> {
    pub fn new(dir: &'a Path, identity: &'a LogIdentity, policy: &'a RotationPolicy) -> Self {
        Self {
            dir,
            identity,
            policy,
        }
    }

    /// Run one retention pass
    ///
    /// `active` lists the files sinks are writing right now; they are kept
    /// along with whatever the pointers resolve to. Only failing to list the
    /// directory is an error, per-file problems land in the report.
    pub fn sweep(&self, now: &DateTime<Local>, active: &[PathBuf]) -> io::Result<SweepReport> {
        let mut report = SweepReport::default();
        let protected = self.protected_names(active);
        let prefix = self.identity.prefix();

        let mut candidates = Vec::new();
        for entry in fs::read_dir(self.dir)? {
            let Ok(entry) = entry else { continue };
            let Ok(name) = entry.file_name().into_string() else { continue };
            if protected.contains(&name) || !name.starts_with(&prefix) {
                continue;
            }
            let Some(parsed) = LogFileName::parse(&name, &prefix) else {
                continue;
            };
            // Pointers and directories are not rotated files.
            let meta = match fs::symlink_metadata(entry.path()) {
                Ok(meta) if meta.is_file() => meta,
                _ => continue,
            };
            candidates.push(Candidate {
                name,
                timestamp: parsed.timestamp,
                disambiguator: parsed.disambiguator,
                size: meta.len(),
                compressed: parsed.compressed,
            });
        }

        if !self.policy.max_age.is_zero() {
            // An age too large to represent means nothing is old enough.
            let cutoff = Duration::from_std(self.policy.max_age)
                .ok()
                .and_then(|age| now.naive_local().checked_sub_signed(age));
            if let Some(cutoff) = cutoff {
                candidates.retain(|c| {
                    if c.timestamp < cutoff {
                        self.remove(&c.name, &mut report);
                        return false;
                    }
                    true
                });
            }
        }

        // Same-second generations are ordered by their disambiguator.
        candidates.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.disambiguator.cmp(&a.disambiguator))
                .then_with(|| b.name.cmp(&a.name))
        });

        if self.policy.max_total_size > 0 {
            let mut total: u64 = 0;
            let mut over_budget = false;
            candidates.retain(|c| {
                if !over_budget && total.saturating_add(c.size) <= self.policy.max_total_size {
                    total += c.size;
                    return true;
                }
                // Everything older than the first file that does not fit goes too.
                over_budget = true;
                self.remove(&c.name, &mut report);
                false
            });
        }

        if self.policy.compress {
            for candidate in candidates.iter().filter(|c| !c.compressed) {
                match gzip_file(&self.dir.join(&candidate.name)) {
                    Ok(_) => report.compressed.push(candidate.name.clone()),
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        tracing::warn!(file = %candidate.name, error = %e, "Failed to compress log file");
                        report.failures.push((candidate.name.clone(), e));
                    }
                }
            }
        }

        if !report.deleted.is_empty() || !report.compressed.is_empty() {
            tracing::debug!(
                dir = %self.dir.display(),
                deleted = report.deleted.len(),
                compressed = report.compressed.len(),
                "Log retention sweep finished"
            );
        }
        Ok(report)
    }

    /// Pointer names, their targets and the active files
    fn protected_names(&self, active: &[PathBuf]) -> HashSet<String> {
        let mut names = HashSet::new();
        for severity in Severity::ALL {
            let pointer = self.identity.pointer_name(severity);
            if let Some(target) = resolve_pointer(self.dir, &pointer) {
                names.insert(target);
            }
            names.insert(pointer);
        }
        for path in active {
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.insert(name.to_string());
            }
        }
        names
    }

    fn remove(&self, name: &str, report: &mut SweepReport) {
        match fs::remove_file(self.dir.join(name)) {
            Ok(()) => report.deleted.push(name.to_string()),
            // Already gone, e.g. removed by an earlier overlapping sweep.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Failed to remove old log file");
                report.failures.push((name.to_string(), e));
            }
        }
    }
}

/// Gzip `path` into `path.gz` and remove the original
///
/// On any failure the original is left in place and no partial archive
/// remains.
pub fn gzip_file(path: &Path) -> io::Result<PathBuf> {
    let mut target = OsString::from(path.as_os_str());
    target.push(GZIP_SUFFIX);
    let target = PathBuf::from(target);

    let mut input = File::open(path)?;
    let output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)?;

    if let Err(e) = write_archive(&mut input, output) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }
    drop(input);

    if let Err(e) = fs::remove_file(path) {
        let _ = fs::remove_file(&target);
        return Err(e);
    }
    Ok(target)
}

fn write_archive(input: &mut File, output: File) -> io::Result<()> {
    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(input, &mut encoder)?;
    let file = encoder.finish()?.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}
