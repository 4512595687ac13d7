//! Post-parse structural checks that can be switched on per scan.

use std::collections::HashSet;

use super::gemfile_lock::ParsedLockfile;

/// A check run against a tokenized lock file after parsing succeeds.
pub trait LockfileValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn enabled(&self) -> bool {
        true
    }

    /// Returns a human-readable reason when the lock file is rejected.
    fn validate(&self, lockfile: &ParsedLockfile) -> Result<(), String>;
}

/// Checks that every `DEPENDENCIES` entry resolved to a spec.
///
/// Off by default: gemspec-driven lock files legitimately declare names
/// that only resolve through a `PATH` source Bundler writes lazily.
#[derive(Debug, Clone, Copy, Default)]
pub struct DependencySectionValidator {
    pub enabled: bool,
}

impl DependencySectionValidator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl LockfileValidator for DependencySectionValidator {
    fn name(&self) -> &'static str {
        "dependency-section"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    fn validate(&self, lockfile: &ParsedLockfile) -> Result<(), String> {
        let resolved: HashSet<&str> = lockfile
            .specs()
            .map(|(_, spec)| spec.name.as_str())
            .collect();

        let missing: Vec<&str> = lockfile
            .dependencies
            .iter()
            .map(|d| d.name.as_str())
            .filter(|name| !resolved.contains(name))
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(format!(
                "DEPENDENCIES entries without a resolved spec: {}",
                missing.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::gemfile_lock;

    const UNRESOLVED: &str = "GEM
  remote: https://rubygems.org/
  specs:
    rack (2.2.8)

DEPENDENCIES
  rack
  sinatra (~> 4.0)

BUNDLED WITH
   2.5.3
";

    #[test]
    fn disabled_by_default() {
        assert!(!DependencySectionValidator::default().enabled());
    }

    #[test]
    fn reports_unresolved_names() {
        let lockfile = gemfile_lock::parse(UNRESOLVED).unwrap();
        let err = DependencySectionValidator::new(true)
            .validate(&lockfile)
            .unwrap_err();
        assert!(err.contains("sinatra"));
        assert!(!err.contains("rack"));
    }
}
