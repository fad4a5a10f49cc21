//! Log file naming
//!
//! Rotated files are named
//! `{program}.{host}.{user}.log.{SEVERITY}.{YYYYMMDD-HHMMSS}.{disambiguator}`,
//! optionally followed by `.gz` or a backup suffix. Each severity also has a
//! fixed-name "current" pointer, `{program}.{SEVERITY}`.

use chrono::NaiveDateTime;

use crate::severity::Severity;

/// Timestamp layout embedded in file names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

const TIMESTAMP_LEN: usize = 15;

/// Suffix of compressed log files
pub const GZIP_SUFFIX: &str = ".gz";

/// Process identity that prefixes every log file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogIdentity {
    pub program: String,
    pub host: String,
    pub user: String,
}

impl LogIdentity {
    pub fn new(
        program: impl Into<String>,
        host: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            program: program.into(),
            host: host.into(),
            user: user.into(),
        }
    }

    /// Identity of the running process
    pub fn detect(program: Option<&str>) -> Self {
        let program = program
            .map(str::to_string)
            .or_else(program_name)
            .unwrap_or_else(|| "program".to_string());
        let host = raw_hostname()
            .map(|h| short_hostname(&h).to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "unknownhost".to_string());
        let user = ["USER", "USERNAME", "LOGNAME"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .map(|u| u.replace('\\', "_"))
            .unwrap_or_else(|| "unknownuser".to_string());
        Self {
            program,
            host,
            user,
        }
    }

    /// `{program}.{host}.{user}.log.` shared by every file this process writes
    pub fn prefix(&self) -> String {
        format!("{}.{}.{}.log.", self.program, self.host, self.user)
    }

    /// Name of a new log file
    pub fn file_name(&self, severity: Severity, time: &NaiveDateTime, disambiguator: u32) -> String {
        format!(
            "{}{}.{}.{}",
            self.prefix(),
            severity.name(),
            time.format(TIMESTAMP_FORMAT),
            disambiguator
        )
    }

    /// Fixed name of the pointer to the newest file of `severity`
    pub fn pointer_name(&self, severity: Severity) -> String {
        format!("{}.{}", self.program, severity.name())
    }
}

/// Host name up to the first dot
pub fn short_hostname(hostname: &str) -> &str {
    match hostname.find('.') {
        Some(i) => &hostname[..i],
        None => hostname,
    }
}

fn program_name() -> Option<String> {
    let exe = std::env::current_exe().ok()?;
    exe.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

#[cfg(unix)]
fn raw_hostname() -> Option<String> {
    let mut buf = [0u8; 256];
    // SAFETY: the buffer is valid for `buf.len()` bytes for the whole call.
    let rc = unsafe { libc::gethostname(buf.as_mut_ptr().cast::<libc::c_char>(), buf.len()) };
    if rc != 0 {
        return None;
    }
    let len = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    String::from_utf8(buf[..len].to_vec()).ok()
}

#[cfg(not(unix))]
fn raw_hostname() -> Option<String> {
    std::env::var("COMPUTERNAME").ok()
}

/// Severity named exactly as rotation writes it, upper case
fn severity_segment(segment: &str) -> Option<Severity> {
    Severity::ALL.iter().copied().find(|sev| sev.name() == segment)
}

/// Timestamp portion of a log file name produced with `prefix`
///
/// Trailing compression or backup suffixes are ignored. Returns `None` for
/// names with another prefix or too short to hold a timestamp.
pub fn extract_timestamp<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?;
    let mut parts = rest.split('.');
    severity_segment(parts.next()?)?;
    let timestamp = parts.next()?;
    if timestamp.len() != TIMESTAMP_LEN {
        return None;
    }
    NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?;
    Some(timestamp)
}

/// Decoded form of a log file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFileName {
    pub severity: Severity,
    pub timestamp: NaiveDateTime,
    pub disambiguator: u32,
    pub compressed: bool,
}

impl LogFileName {
    /// Decode `name`, or `None` if it was not produced under `prefix`
    pub fn parse(name: &str, prefix: &str) -> Option<Self> {
        let timestamp = extract_timestamp(name, prefix)?;
        let mut parts = name[prefix.len()..].split('.');
        let severity = severity_segment(parts.next()?)?;
        parts.next()?;
        let disambiguator = parts.next()?.parse().ok()?;
        let compressed = parts.any(|p| p == "gz");
        Some(Self {
            severity,
            timestamp: NaiveDateTime::parse_from_str(timestamp, TIMESTAMP_FORMAT).ok()?,
            disambiguator,
            compressed,
        })
    }

    /// Encode back into a file name for `identity`
    pub fn render(&self, identity: &LogIdentity) -> String {
        let name = identity.file_name(self.severity, &self.timestamp, self.disambiguator);
        if self.compressed {
            name + GZIP_SUFFIX
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn identity() -> LogIdentity {
        LogIdentity::new("prog", "host", "user")
    }

    #[test]
    fn test_short_hostname() {
        assert_eq!(short_hostname(""), "");
        assert_eq!(short_hostname("host"), "host");
        assert_eq!(short_hostname("host.example.com"), "host");
    }

    #[test]
    fn test_extract_timestamp() {
        let prefix = "geth_test.sampleHost.sampleUser.log.";
        let cases = [
            ("INFO.20171202-132113.2841", Some("20171202-132113")),
            ("WARNING.20171202-210922.13848", Some("20171202-210922")),
            ("WARNING.20171202-210922.13848.gz", Some("20171202-210922")),
            ("WARNING.20171202-210922.13848.gz.bak", Some("20171202-210922")),
            ("WARNING.20171202-21092", None),
        ];
        for (suffix, expected) in cases {
            let name = format!("{}{}", prefix, suffix);
            assert_eq!(extract_timestamp(&name, prefix), expected, "{name}");
        }
        assert_eq!(extract_timestamp("WARNING.20171202-21092", prefix), None);
    }

    #[test]
    fn test_extract_timestamp_with_prog_prefix() {
        assert_eq!(
            extract_timestamp(
                "prog.host.user.log.WARNING.20171202-210922.13848.gz",
                "prog.host.user.log."
            ),
            Some("20171202-210922")
        );
    }

    #[test]
    fn test_file_name_parses_back() {
        let time = NaiveDate::from_ymd_opt(2017, 12, 2)
            .unwrap()
            .and_hms_opt(21, 9, 22)
            .unwrap();
        let name = identity().file_name(Severity::Warning, &time, 13848);
        assert_eq!(name, "prog.host.user.log.WARNING.20171202-210922.13848");

        let parsed = LogFileName::parse(&name, &identity().prefix()).unwrap();
        assert_eq!(parsed.severity, Severity::Warning);
        assert_eq!(parsed.timestamp, time);
        assert_eq!(parsed.disambiguator, 13848);
        assert!(!parsed.compressed);
        assert_eq!(parsed.render(&identity()), name);
    }

    #[test]
    fn test_parse_compressed_name() {
        let name = "prog.host.user.log.ERROR.20180101-000000.7.gz";
        let parsed = LogFileName::parse(name, &identity().prefix()).unwrap();
        assert!(parsed.compressed);
        assert_eq!(parsed.render(&identity()), name);
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        let prefix = identity().prefix();
        assert!(LogFileName::parse("prog.INFO", &prefix).is_none());
        assert!(LogFileName::parse("prog.host.other.log.INFO.20180101-000000.1", &prefix).is_none());
        assert!(LogFileName::parse("prog.host.user.log.DEBUG.20180101-000000.1", &prefix).is_none());
        assert!(LogFileName::parse("prog.host.user.log.info.20180101-000000.1", &prefix).is_none());
        assert_eq!(
            extract_timestamp("prog.host.user.log.Warning.20171202-210922.1", &prefix),
            None
        );
        assert!(LogFileName::parse("prog.host.user.log.INFO.2018010x-000000.1", &prefix).is_none());
    }

    #[test]
    fn test_pointer_name() {
        assert_eq!(identity().pointer_name(Severity::Info), "prog.INFO");
    }

    #[test]
    fn test_detect_identity() {
        let id = LogIdentity::detect(Some("server"));
        assert_eq!(id.program, "server");
        assert!(!id.host.contains('.'));
        assert!(!id.user.is_empty());
        assert!(id.prefix().starts_with("server."));
    }
}
