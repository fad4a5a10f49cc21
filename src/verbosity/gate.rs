//! Verbosity gating
//!
//! The gate holds the global threshold and the compiled module overrides as
//! one immutable snapshot. Readers load it without locking; updates build a
//! new snapshot and swap it in whole.

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

use super::pattern::{compile_module_pattern, ModulePattern};
use crate::config::ModuleOverrideSpec;
use crate::error::Result;

/// A compiled `pattern=level` pair
#[derive(Debug, Clone)]
pub struct ModuleOverride {
    pub pattern: ModulePattern,
    pub level: u32,
}

impl ModuleOverride {
    pub fn compile(spec: &ModuleOverrideSpec) -> Result<Self> {
        Ok(Self {
            pattern: compile_module_pattern(&spec.pattern)?,
            level: spec.level,
        })
    }
}

#[derive(Debug, Default)]
struct Snapshot {
    global: u32,
    /// In installation order
    overrides: Vec<ModuleOverride>,
}

impl Snapshot {
    /// Threshold that applies to `module`
    fn threshold(&self, module: &str) -> u32 {
        let mut best: Option<&ModuleOverride> = None;
        for candidate in self.overrides.iter().filter(|o| o.pattern.matches(module)) {
            // Equal specificity replaces, so the later override wins a tie.
            match best {
                Some(b) if candidate.pattern.specificity() < b.pattern.specificity() => {}
                _ => best = Some(candidate),
            }
        }
        best.map_or(self.global, |o| o.level)
    }
}

/// Decides whether a debug call at some level is emitted
#[derive(Debug, Default)]
pub struct VerbosityGate {
    snapshot: ArcSwap<Snapshot>,
    /// Serializes read-modify-write updates
    update: Mutex<()>,
}

impl VerbosityGate {
    pub fn new(global: u32, overrides: &[ModuleOverrideSpec]) -> Result<Self> {
        let overrides = overrides
            .iter()
            .map(ModuleOverride::compile)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            snapshot: ArcSwap::from_pointee(Snapshot { global, overrides }),
            update: Mutex::new(()),
        })
    }

    /// Whether a call at `level` from `module` passes
    pub fn allows(&self, level: u32, module: &str) -> bool {
        let snapshot = self.snapshot.load();
        if snapshot.overrides.is_empty() {
            return level <= snapshot.global;
        }
        level <= snapshot.threshold(module)
    }

    pub fn global_level(&self) -> u32 {
        self.snapshot.load().global
    }

    pub fn set_global_level(&self, level: u32) {
        let _guard = self.update.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot.load_full();
        self.snapshot.store(Arc::new(Snapshot {
            global: level,
            overrides: current.overrides.clone(),
        }));
    }

    /// Replace every override at once
    ///
    /// All patterns are compiled before anything is installed, so an invalid
    /// pattern leaves the previous set in place.
    pub fn set_overrides(&self, specs: &[ModuleOverrideSpec]) -> Result<()> {
        let overrides = specs
            .iter()
            .map(ModuleOverride::compile)
            .collect::<Result<Vec<_>>>()?;
        let _guard = self.update.lock().unwrap_or_else(PoisonError::into_inner);
        let global = self.snapshot.load().global;
        self.snapshot.store(Arc::new(Snapshot { global, overrides }));
        Ok(())
    }

    /// Patterns currently installed, in installation order
    pub fn override_patterns(&self) -> Vec<(String, u32)> {
        self.snapshot
            .load()
            .overrides
            .iter()
            .map(|o| (o.pattern.as_str().to_string(), o.level))
            .collect()
    }
}
