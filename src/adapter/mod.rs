//! Boundary collaborators that feed external data into a scan.
//!
//! The core never talks to the network directly; it asks an
//! [`AdvisorySource`] for advisories and a [`PopularitySource`] for the
//! typosquat reference corpus.

pub mod local;
pub mod osv;
pub mod rubygems;

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ir::{Dependency, VulnerabilityRecord};

pub use local::FileAdvisorySource;
pub use osv::OsvAdvisorySource;
pub use rubygems::RemotePopularity;

/// Supplies advisories for a set of resolved dependencies.
pub trait AdvisorySource: Send + Sync {
    /// Short name for logs ("osv", "file").
    fn name(&self) -> &str;

    fn fetch_for(&self, dependencies: &[Dependency]) -> Result<Vec<VulnerabilityRecord>>;
}

/// A popular gem and its lifetime download count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularGem {
    pub name: String,
    pub downloads: u64,
}

/// Supplies the popular-gem corpus for typosquat comparison.
pub trait PopularitySource: Send + Sync {
    fn fetch_popular_gems(&self) -> Result<Vec<PopularGem>>;
}

/// The built-in corpus; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinPopularity;

impl PopularitySource for BuiltinPopularity {
    fn fetch_popular_gems(&self) -> Result<Vec<PopularGem>> {
        Ok(crate::analysis::supply_chain::builtin_popular_gems())
    }
}

/// Fixed in-memory advisory list, filtered to the requested dependencies.
#[derive(Debug, Clone, Default)]
pub struct StaticAdvisories {
    records: Vec<VulnerabilityRecord>,
}

impl StaticAdvisories {
    pub fn new(records: Vec<VulnerabilityRecord>) -> Self {
        Self { records }
    }
}

impl AdvisorySource for StaticAdvisories {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch_for(&self, dependencies: &[Dependency]) -> Result<Vec<VulnerabilityRecord>> {
        Ok(retain_requested(self.records.clone(), dependencies))
    }
}

/// Fetch from several sources, keeping the first record seen per
/// `(id, package)`. A failing source is logged and skipped.
pub fn fetch_all(
    sources: &[Box<dyn AdvisorySource>],
    dependencies: &[Dependency],
) -> Vec<VulnerabilityRecord> {
    let mut seen = HashSet::new();
    let mut records = Vec::new();

    for source in sources {
        match source.fetch_for(dependencies) {
            Ok(fetched) => {
                tracing::debug!(source = source.name(), count = fetched.len(), "fetched advisories");
                for record in fetched {
                    if seen.insert((record.id.clone(), record.package_name.clone())) {
                        records.push(record);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    source = source.name(),
                    error = %e,
                    "advisory source failed, continuing without it"
                );
            }
        }
    }

    records
}

fn retain_requested(
    records: Vec<VulnerabilityRecord>,
    dependencies: &[Dependency],
) -> Vec<VulnerabilityRecord> {
    let names: HashSet<&str> = dependencies.iter().map(|d| d.name.as_str()).collect();
    records
        .into_iter()
        .filter(|r| names.contains(r.package_name.as_str()))
        .collect()
}

pub(crate) fn make_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(10).min(timeout))
        .timeout_read(timeout)
        .build()
}

pub(crate) fn transport_error(endpoint: &str, err: ureq::Error) -> crate::error::GuardError {
    match err {
        ureq::Error::Status(code, _) => {
            crate::error::GuardError::Advisory(format!("{} returned HTTP {}", endpoint, code))
        }
        ureq::Error::Transport(t) => {
            crate::error::GuardError::Advisory(format!("cannot reach {}: {}", endpoint, t))
        }
    }
}
