//! Lock file parsing and normalization.
//!
//! [`LockfileParser::parse`] turns a `Gemfile.lock` into an ordered,
//! name-deduplicated list of [`Dependency`] records.

pub mod gemfile_lock;
pub mod validation;

use std::collections::HashSet;
use std::path::Path;

use crate::error::{GuardError, Result};
use crate::ir::{Dependency, DEFAULT_SOURCE};

use gemfile_lock::{LockSource, SourceKind};
pub use validation::{DependencySectionValidator, LockfileValidator};

/// Section every complete lock file ends with.
const TERMINAL_MARKER: &str = "BUNDLED WITH";

pub struct LockfileParser {
    validators: Vec<Box<dyn LockfileValidator>>,
}

impl LockfileParser {
    /// Parser with the dependency-section cross-check registered but disabled.
    pub fn new() -> Self {
        Self {
            validators: vec![Box::new(DependencySectionValidator::default())],
        }
    }

    /// Toggle the `DEPENDENCIES` cross-check.
    pub fn with_dependency_validation(mut self, enabled: bool) -> Self {
        self.validators.retain(|v| v.name() != "dependency-section");
        self.validators
            .push(Box::new(DependencySectionValidator::new(enabled)));
        self
    }

    pub fn with_validator(mut self, validator: Box<dyn LockfileValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn parse(&self, path: &Path) -> Result<Vec<Dependency>> {
        let bytes = std::fs::read(path)
            .map_err(|e| GuardError::file(path, format!("cannot read lock file: {}", e)))?;
        let content = String::from_utf8(bytes)
            .map_err(|e| GuardError::invalid_lockfile(path, format!("not valid UTF-8: {}", e)))?;
        self.parse_str(path, &content)
    }

    /// Parse already-loaded text; `path` is used for error messages only.
    pub fn parse_str(&self, path: &Path, content: &str) -> Result<Vec<Dependency>> {
        let lockfile = gemfile_lock::parse(content)
            .map_err(|e| GuardError::invalid_lockfile(path, e.to_string()))?;

        if !has_terminal_marker(content) {
            return Err(GuardError::invalid_lockfile(
                path,
                format!("missing '{}' section", TERMINAL_MARKER),
            ));
        }

        for validator in self.validators.iter().filter(|v| v.enabled()) {
            validator.validate(&lockfile).map_err(|message| {
                GuardError::invalid_lockfile(path, format!("{} ({})", message, validator.name()))
            })?;
        }

        let dependencies: Vec<Dependency> = lockfile
            .specs()
            .map(|(source, spec)| {
                Dependency::new(&spec.name, &spec.version, source_uri(source))
                    .with_dependencies(spec.dependencies.iter().cloned())
            })
            .collect();

        let total = dependencies.len();
        let deduped = dedup_by_name(dependencies);
        tracing::debug!(
            path = %path.display(),
            specs = total,
            dependencies = deduped.len(),
            "parsed lock file"
        );
        Ok(deduped)
    }
}

impl Default for LockfileParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a lock file with default settings.
pub fn parse(path: &Path) -> Result<Vec<Dependency>> {
    LockfileParser::new().parse(path)
}

fn has_terminal_marker(content: &str) -> bool {
    content.contains(&format!("\n{}", TERMINAL_MARKER))
        || content.ends_with(&format!("{}\n", TERMINAL_MARKER))
}

fn source_uri(source: &LockSource) -> String {
    match (&source.remote, source.kind) {
        (Some(remote), SourceKind::Gem) => remote.trim_end_matches('/').to_string(),
        (Some(remote), _) => remote.clone(),
        (None, _) => DEFAULT_SOURCE.to_string(),
    }
}

/// Keep the first entry for each name; platform variants collapse onto it.
fn dedup_by_name(dependencies: Vec<Dependency>) -> Vec<Dependency> {
    let mut seen = HashSet::new();
    dependencies
        .into_iter()
        .filter(|dep| seen.insert(dep.name.clone()))
        .collect()
}
