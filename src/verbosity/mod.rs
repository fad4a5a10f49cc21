//! Per-module verbosity control
//!
//! Debug calls carry a numeric level. The gate compares it against the global
//! threshold, or against the most specific module override that matches the
//! caller's source path.

mod gate;
mod pattern;

pub use gate::{ModuleOverride, VerbosityGate};
pub use pattern::{compile_module_pattern, ModulePattern, Specificity, SOURCE_SUFFIX};
