use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, TyposquatMatch, VulnerableDependency};
use crate::ir::Severity;

/// Filters applied to scan results after analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Exit non-zero when vulnerabilities remain.
    #[serde(default = "default_fail_on_vulnerabilities")]
    pub fail_on_vulnerabilities: bool,
    /// Minimum classified severity to report. `unknown` always passes.
    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: Severity,
    /// Advisory IDs to ignore entirely.
    #[serde(default)]
    pub ignore_vulnerabilities: HashSet<String>,
    /// Gem names to ignore entirely.
    #[serde(default)]
    pub ignore_gems: HashSet<String>,
}

fn default_fail_on_vulnerabilities() -> bool {
    true
}

fn default_severity_threshold() -> Severity {
    Severity::Low
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            fail_on_vulnerabilities: true,
            severity_threshold: Severity::Low,
            ignore_vulnerabilities: HashSet::new(),
            ignore_gems: HashSet::new(),
        }
    }
}

impl Policy {
    pub fn should_ignore_vulnerability(&self, id: &str) -> bool {
        self.ignore_vulnerabilities.contains(id)
    }

    pub fn should_ignore_gem(&self, name: &str) -> bool {
        self.ignore_gems.contains(name)
    }

    pub fn meets_severity_threshold(&self, severity: Severity) -> bool {
        severity == Severity::Unknown || severity >= self.severity_threshold
    }

    fn keeps(&self, vd: &VulnerableDependency) -> bool {
        !self.should_ignore_gem(&vd.dependency.name)
            && !self.should_ignore_vulnerability(&vd.vulnerability.id)
            && self.meets_severity_threshold(vd.severity())
    }

    /// Drop ignored gems, ignored advisories and entries below the threshold.
    pub fn apply(&self, analysis: &Analysis) -> Analysis {
        let kept: Vec<VulnerableDependency> = analysis
            .vulnerable_dependencies
            .iter()
            .filter(|vd| self.keeps(vd))
            .cloned()
            .collect();

        let dropped = analysis.vulnerability_count() - kept.len();
        if dropped > 0 {
            tracing::info!(dropped, "policy filtered vulnerabilities");
        }
        Analysis::new(kept)
    }

    pub fn apply_typosquats(&self, matches: Vec<TyposquatMatch>) -> Vec<TyposquatMatch> {
        matches
            .into_iter()
            .filter(|m| !self.should_ignore_gem(&m.gem_name))
            .collect()
    }

    /// Whether the filtered analysis should fail the run.
    pub fn fails(&self, analysis: &Analysis) -> bool {
        self.fail_on_vulnerabilities && analysis.has_vulnerabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use crate::ir::{Dependency, VulnerabilityRecord, DEFAULT_SOURCE};

    fn analysis() -> Analysis {
        let deps = vec![
            Dependency::new("rack", "2.2.3", DEFAULT_SOURCE),
            Dependency::new("rexml", "3.2.4", DEFAULT_SOURCE),
        ];
        let vulns = vec![
            VulnerabilityRecord::new("CVE-1", "rack", "HIGH"),
            VulnerabilityRecord::new("CVE-2", "rack", "LOW"),
            VulnerabilityRecord::new("CVE-3", "rack", ""),
            VulnerabilityRecord::new("CVE-4", "rexml", "CRITICAL"),
        ];
        Analyzer::new().analyze(&deps, &vulns)
    }

    fn ids(analysis: &Analysis) -> Vec<&str> {
        analysis
            .vulnerable_dependencies
            .iter()
            .map(|vd| vd.vulnerability.id.as_str())
            .collect()
    }

    #[test]
    fn default_policy_keeps_everything() {
        let filtered = Policy::default().apply(&analysis());
        assert_eq!(filtered.vulnerability_count(), 4);
        assert!(Policy::default().fails(&filtered));
    }

    #[test]
    fn threshold_drops_lower_severities_but_keeps_unknown() {
        let policy = Policy {
            severity_threshold: Severity::High,
            ..Default::default()
        };
        assert_eq!(ids(&policy.apply(&analysis())), vec!["CVE-1", "CVE-3", "CVE-4"]);
    }

    #[test]
    fn ignore_lists_remove_entries() {
        let mut policy = Policy::default();
        policy.ignore_gems.insert("rexml".into());
        policy.ignore_vulnerabilities.insert("CVE-2".into());
        assert_eq!(ids(&policy.apply(&analysis())), vec!["CVE-1", "CVE-3"]);
    }

    #[test]
    fn fail_switch() {
        let policy = Policy {
            fail_on_vulnerabilities: false,
            ..Default::default()
        };
        assert!(!policy.fails(&analysis()));
        assert!(!Policy::default().fails(&Analysis::default()));
    }
}
