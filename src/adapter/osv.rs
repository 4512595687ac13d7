//! OSV.dev advisory source for the RubyGems ecosystem.

use std::collections::HashSet;
use std::time::Duration;

use serde::Deserialize;
use serde_json::json;

use super::{make_agent, transport_error, AdvisorySource};
use crate::error::{GuardError, Result};
use crate::ir::{compare_versions, Dependency, VulnerabilityRecord};

pub const DEFAULT_OSV_API_BASE: &str = "https://api.osv.dev";
const ECOSYSTEM: &str = "RubyGems";
const BATCH_SIZE: usize = 100;

#[derive(Deserialize)]
struct BatchResponse {
    #[serde(default)]
    results: Vec<BatchResult>,
}

#[derive(Deserialize)]
struct BatchResult {
    #[serde(default)]
    vulns: Vec<VulnRef>,
}

#[derive(Deserialize)]
struct VulnRef {
    id: String,
}

/// Subset of the OSV vulnerability schema.
#[derive(Debug, Deserialize)]
pub(crate) struct OsvVulnerability {
    id: String,
    #[serde(default)]
    summary: String,
    #[serde(default)]
    details: String,
    #[serde(default)]
    affected: Vec<Affected>,
    #[serde(default)]
    database_specific: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Affected {
    package: AffectedPackage,
    #[serde(default)]
    ranges: Vec<Range>,
}

#[derive(Debug, Deserialize)]
struct AffectedPackage {
    name: String,
    ecosystem: String,
}

#[derive(Debug, Deserialize)]
struct Range {
    #[serde(default)]
    events: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct Event {
    introduced: Option<String>,
    fixed: Option<String>,
}

pub struct OsvAdvisorySource {
    agent: ureq::Agent,
    api_base: String,
}

impl OsvAdvisorySource {
    pub fn new(api_base: &str, timeout: Duration) -> Self {
        Self {
            agent: make_agent(timeout),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }

    fn query_ids(&self, dependencies: &[Dependency]) -> Result<Vec<String>> {
        let endpoint = format!("{}/v1/querybatch", self.api_base);
        let mut seen = HashSet::new();
        let mut ids = Vec::new();

        for chunk in dependencies.chunks(BATCH_SIZE) {
            let queries: Vec<serde_json::Value> = chunk
                .iter()
                .map(|d| {
                    json!({
                        "package": { "name": d.name, "ecosystem": ECOSYSTEM },
                        "version": d.version,
                    })
                })
                .collect();

            let batch: BatchResponse = self
                .agent
                .post(&endpoint)
                .send_json(json!({ "queries": queries }))
                .map_err(|e| transport_error(&endpoint, e))?
                .into_json()
                .map_err(|e| GuardError::Advisory(format!("malformed OSV batch response: {}", e)))?;

            for vuln in batch.results.into_iter().flat_map(|r| r.vulns) {
                if seen.insert(vuln.id.clone()) {
                    ids.push(vuln.id);
                }
            }
        }

        Ok(ids)
    }

    fn fetch_vulnerability(&self, id: &str) -> Result<OsvVulnerability> {
        let endpoint = format!("{}/v1/vulns/{}", self.api_base, id);
        self.agent
            .get(&endpoint)
            .call()
            .map_err(|e| transport_error(&endpoint, e))?
            .into_json()
            .map_err(|e| GuardError::Advisory(format!("malformed OSV record {}: {}", id, e)))
    }
}

impl AdvisorySource for OsvAdvisorySource {
    fn name(&self) -> &str {
        "osv"
    }

    fn fetch_for(&self, dependencies: &[Dependency]) -> Result<Vec<VulnerabilityRecord>> {
        if dependencies.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.query_ids(dependencies)?;
        tracing::info!(advisories = ids.len(), "OSV reported matching advisories");

        Ok(collect_records(ids, |id| self.fetch_vulnerability(id)))
    }
}

/// Fetch each advisory by id; an id that fails is logged and skipped.
fn collect_records<F>(ids: Vec<String>, fetch: F) -> Vec<VulnerabilityRecord>
where
    F: Fn(&str) -> Result<OsvVulnerability>,
{
    let mut records = Vec::new();
    for id in ids {
        match fetch(&id) {
            Ok(vuln) => records.extend(to_records(vuln)),
            Err(e) => tracing::warn!(id = %id, error = %e, "skipping OSV advisory"),
        }
    }
    records
}

/// One record per affected RubyGems package in the advisory.
pub(crate) fn to_records(vuln: OsvVulnerability) -> Vec<VulnerabilityRecord> {
    let severity = vuln
        .database_specific
        .as_ref()
        .and_then(|d| d.get("severity"))
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();

    vuln.affected
        .iter()
        .filter(|a| a.package.ecosystem == ECOSYSTEM)
        .map(|affected| {
            let mut fixed: Vec<String> = Vec::new();
            let mut ranges = Vec::new();

            for range in &affected.ranges {
                let mut introduced: Option<&str> = None;
                for event in &range.events {
                    if let Some(v) = &event.introduced {
                        introduced = Some(v.as_str());
                    }
                    if let Some(v) = &event.fixed {
                        ranges.push(match introduced.take() {
                            Some("0") | None => format!("< {}", v),
                            Some(start) => format!(">= {}, < {}", start, v),
                        });
                        if !fixed.contains(v) {
                            fixed.push(v.clone());
                        }
                    }
                }
                if let Some(start) = introduced {
                    ranges.push(format!(">= {}", start));
                }
            }

            fixed.sort_by(|a, b| compare_versions(a, b));

            VulnerabilityRecord {
                id: vuln.id.clone(),
                package_name: affected.package.name.clone(),
                severity: severity.clone(),
                summary: vuln.summary.clone(),
                details: vuln.details.clone(),
                affected_versions: ranges,
                fixed_versions: fixed,
            }
        })
        .collect()
}
