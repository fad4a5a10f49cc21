//! Record header formatting
//!
//! Every record starts with
//! `Lmmdd hh:mm:ss.uuuuuu pid module:line] `, where L is the severity
//! character. The same bytes go to every sink the record cascades into.

use chrono::{DateTime, Local};

use crate::file_name::LogIdentity;
use crate::severity::Severity;

/// Cargo registry sources: `.../registry/src/<index>/<crate>-<ver>/src/lib.rs`
const REGISTRY_MARKER: &str = "/registry/src/";

/// Components kept from an absolute path outside any known root
const KEPT_COMPONENTS: usize = 3;

/// Builds header lines and new-file banners
#[derive(Debug, Clone)]
pub struct HeaderFormatter {
    pid: u32,
    build_roots: Vec<String>,
}

impl HeaderFormatter {
    pub fn new(pid: u32, build_roots: Vec<String>) -> Self {
        Self { pid, build_roots }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Render one record: header, message and exactly one trailing newline
    pub fn format(
        &self,
        severity: Severity,
        time: &DateTime<Local>,
        module: &str,
        line: u32,
        message: &str,
    ) -> Vec<u8> {
        let module = abbreviate_module(module, &self.build_roots);
        let mut record = format!(
            "{}{} {} {}:{}] {}",
            severity.as_char(),
            time.format("%m%d %H:%M:%S%.6f"),
            self.pid,
            module,
            line,
            message
        );
        if !record.ends_with('\n') {
            record.push('\n');
        }
        record.into_bytes()
    }

    /// Banner written at the top of every new log file
    pub fn file_banner(&self, identity: &LogIdentity, created: &DateTime<Local>) -> Vec<u8> {
        format!(
            "Log file created at: {}\n\
             Running on machine: {}\n\
             Binary: {} for {}/{}\n\
             Log line format: [IWEF]mmdd hh:mm:ss.uuuuuu pid file:line] msg\n",
            created.format("%Y/%m/%d %H:%M:%S"),
            identity.host,
            identity.program,
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
        .into_bytes()
    }
}

/// Shorten a source path for display
///
/// Configured build roots and the cargo registry prefix are stripped. Other
/// absolute paths keep only their last few components.
pub fn abbreviate_module<'a>(path: &'a str, build_roots: &[String]) -> &'a str {
    for root in build_roots {
        if let Some(rest) = path.strip_prefix(root.as_str()) {
            let rest = rest.trim_start_matches('/');
            if !rest.is_empty() {
                return rest;
            }
        }
    }

    if let Some(i) = path.find(REGISTRY_MARKER) {
        let after_marker = &path[i + REGISTRY_MARKER.len()..];
        if let Some(j) = after_marker.find('/') {
            return &after_marker[j + 1..];
        }
    }

    if path.starts_with('/') {
        let mut cut = path.len();
        for _ in 0..KEPT_COMPONENTS {
            match path[..cut].rfind('/') {
                Some(i) => cut = i,
                None => return path,
            }
        }
        return &path[cut + 1..];
    }

    path
}
