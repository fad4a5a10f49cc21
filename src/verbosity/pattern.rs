//! Glob to regex compilation for module overrides
//!
//! A pattern is a `/`-separated path glob where `*` stands for a whole
//! segment. Compiled matchers are anchored at the end of the module path.

use regex::Regex;

use crate::error::{ConfigError, Result};

/// Source file suffix every module path ends with
pub const SOURCE_SUFFIX: &str = ".rs";

/// Ordering key for overlapping patterns; larger wins
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    /// Patterns without any wildcard outrank wildcard patterns
    literal: bool,
    /// Length of the literal text before the first wildcard
    prefix_len: usize,
}

/// A compiled module glob
#[derive(Debug, Clone)]
pub struct ModulePattern {
    source: String,
    matcher: Regex,
    specificity: Specificity,
}

impl ModulePattern {
    /// Original glob text
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Regex the glob compiled to
    pub fn regex(&self) -> &Regex {
        &self.matcher
    }

    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Whether a module path (e.g. `src/net/conn.rs`) matches
    pub fn matches(&self, module: &str) -> bool {
        if module.starts_with('/') {
            self.matcher.is_match(module)
        } else {
            // The compiled form expects a separator before the first segment.
            self.matcher.is_match(&format!("/{}", module))
        }
    }
}

/// Compile a module glob into an end-anchored matcher
pub fn compile_module_pattern(pattern: &str) -> Result<ModulePattern> {
    let invalid = |reason: &str| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty pattern"));
    }

    let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return Err(invalid("pattern has no path segments"));
    }

    let mut matcher = String::from(".*");
    let mut prefix_len = 0;
    let mut seen_wildcard = false;

    for segment in &segments {
        if *segment == "*" {
            matcher.push_str("(/.*)?");
            seen_wildcard = true;
            continue;
        }
        if segment.contains('*') {
            return Err(invalid("'*' must be a whole path segment"));
        }
        matcher.push('/');
        matcher.push_str(&regex::escape(segment));
        if !seen_wildcard {
            prefix_len += segment.len() + 1;
        }
    }

    let last = segments[segments.len() - 1];
    if last == "*" {
        matcher.push_str(&format!("/[^/]+{}", regex::escape(SOURCE_SUFFIX)));
    } else if !last.ends_with(SOURCE_SUFFIX) {
        // A bare stem names either `<stem>.rs` or the files of directory `<stem>`.
        let suffix = regex::escape(SOURCE_SUFFIX);
        matcher.push_str(&format!("({}|/[^/]+{})", suffix, suffix));
    }
    matcher.push('$');

    Ok(ModulePattern {
        source: trimmed.to_string(),
        matcher: Regex::new(&matcher)?,
        specificity: Specificity {
            literal: !seen_wildcard,
            prefix_len,
        },
    })
}
