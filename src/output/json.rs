use serde::Serialize;

use crate::analysis::{Analysis, TyposquatMatch};
use crate::error::Result;
use crate::fix::FixResult;
use crate::ir::{Dependency, VulnerabilityRecord};
use crate::ScanReport;

#[derive(Serialize)]
struct Summary {
    total_vulnerabilities: usize,
    high_severity_count: usize,
    has_vulnerabilities: bool,
    dependency_count: usize,
    typosquat_count: usize,
}

#[derive(Serialize)]
struct GemRef<'a> {
    name: &'a str,
    version: &'a str,
    source: &'a str,
}

impl<'a> From<&'a Dependency> for GemRef<'a> {
    fn from(dep: &'a Dependency) -> Self {
        Self {
            name: &dep.name,
            version: &dep.version,
            source: &dep.source,
        }
    }
}

#[derive(Serialize)]
struct VulnerabilityEntry<'a> {
    gem: GemRef<'a>,
    vulnerability: &'a VulnerabilityRecord,
    recommended_fix: &'a str,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: Summary,
    vulnerabilities: Vec<VulnerabilityEntry<'a>>,
    typosquats: &'a [TyposquatMatch],
}

fn entries(analysis: &Analysis) -> Vec<VulnerabilityEntry<'_>> {
    analysis
        .vulnerable_dependencies
        .iter()
        .map(|vd| VulnerabilityEntry {
            gem: GemRef::from(&vd.dependency),
            vulnerability: &vd.vulnerability,
            recommended_fix: &vd.recommended_fix,
        })
        .collect()
}

/// Render a scan as a JSON report.
pub fn render_scan(report: &ScanReport) -> Result<String> {
    let analysis = &report.analysis;
    let json = JsonReport {
        summary: Summary {
            total_vulnerabilities: analysis.vulnerability_count(),
            high_severity_count: analysis.high_severity_count(),
            has_vulnerabilities: analysis.has_vulnerabilities(),
            dependency_count: report.dependencies.len(),
            typosquat_count: report.typosquats.len(),
        },
        vulnerabilities: entries(analysis),
        typosquats: &report.typosquats,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

pub fn render_fix(result: &FixResult) -> Result<String> {
    Ok(serde_json::to_string_pretty(result)?)
}

pub fn render_typosquats(matches: &[TyposquatMatch]) -> Result<String> {
    Ok(serde_json::to_string_pretty(matches)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Analyzer;
    use crate::ir::DEFAULT_SOURCE;

    #[test]
    fn scan_report_shape() {
        let deps = vec![Dependency::new("actionpack", "6.1.0", DEFAULT_SOURCE)];
        let vulns = vec![VulnerabilityRecord::new("CVE-2021-22885", "actionpack", "HIGH")
            .with_fixed_versions(["6.1.3.1"])];
        let report = ScanReport {
            analysis: Analyzer::new().analyze(&deps, &vulns),
            dependencies: deps,
            typosquats: Vec::new(),
        };

        let value: serde_json::Value =
            serde_json::from_str(&render_scan(&report).unwrap()).unwrap();
        assert_eq!(value["summary"]["total_vulnerabilities"], 1);
        assert_eq!(value["summary"]["high_severity_count"], 1);
        assert_eq!(value["summary"]["has_vulnerabilities"], true);
        let entry = &value["vulnerabilities"][0];
        assert_eq!(entry["gem"]["name"], "actionpack");
        assert_eq!(entry["gem"]["source"], "https://rubygems.org");
        assert_eq!(entry["vulnerability"]["id"], "CVE-2021-22885");
        assert_eq!(entry["vulnerability"]["fixed_versions"][0], "6.1.3.1");
        assert_eq!(entry["recommended_fix"], "bundle update actionpack --to 6.1.3.1");
    }

    #[test]
    fn empty_scan() {
        let report = ScanReport::default();
        let value: serde_json::Value =
            serde_json::from_str(&render_scan(&report).unwrap()).unwrap();
        assert_eq!(value["summary"]["has_vulnerabilities"], false);
        assert_eq!(value["vulnerabilities"].as_array().unwrap().len(), 0);
    }
}
