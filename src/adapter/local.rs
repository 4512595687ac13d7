//! Advisories from a local JSON file, for offline and air-gapped scans.

use std::path::{Path, PathBuf};

use super::{retain_requested, AdvisorySource};
use crate::error::{GuardError, Result};
use crate::ir::{Dependency, VulnerabilityRecord};

/// Reads a JSON array of advisory records.
pub struct FileAdvisorySource {
    path: PathBuf,
}

impl FileAdvisorySource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AdvisorySource for FileAdvisorySource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch_for(&self, dependencies: &[Dependency]) -> Result<Vec<VulnerabilityRecord>> {
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| GuardError::file(&self.path, format!("cannot read advisories: {}", e)))?;
        let records: Vec<VulnerabilityRecord> = serde_json::from_str(&content)?;
        Ok(retain_requested(records, dependencies))
    }
}
