//! Correlates resolved dependencies with advisory records.

use serde::Serialize;

use crate::ir::{Dependency, Severity, VulnerabilityRecord};

/// Marker preceding the target version in a recommended fix command.
pub const FIX_VERSION_MARKER: &str = "--to";

/// Decides whether a dependency version falls inside an advisory's
/// affected ranges.
pub trait VersionPredicate: Send + Sync {
    fn is_affected(&self, version: &str, affected_versions: &[String]) -> bool;
}

impl<F> VersionPredicate for F
where
    F: Fn(&str, &[String]) -> bool + Send + Sync,
{
    fn is_affected(&self, version: &str, affected_versions: &[String]) -> bool {
        self(version, affected_versions)
    }
}

/// Treats every name match as affected. Affected ranges are not evaluated.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysAffected;

impl VersionPredicate for AlwaysAffected {
    fn is_affected(&self, _version: &str, _affected_versions: &[String]) -> bool {
        true
    }
}

/// One advisory applied to one dependency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VulnerableDependency {
    pub dependency: Dependency,
    pub vulnerability: VulnerabilityRecord,
    /// Remediation command, e.g. `bundle update nokogiri --to 1.18.9`.
    pub recommended_fix: String,
}

impl VulnerableDependency {
    pub fn severity(&self) -> Severity {
        self.vulnerability.severity_level()
    }
}

/// Aggregate result of a scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Analysis {
    pub vulnerable_dependencies: Vec<VulnerableDependency>,
}

impl Analysis {
    pub fn new(vulnerable_dependencies: Vec<VulnerableDependency>) -> Self {
        Self {
            vulnerable_dependencies,
        }
    }

    pub fn has_vulnerabilities(&self) -> bool {
        !self.vulnerable_dependencies.is_empty()
    }

    /// One entry per (dependency, advisory) pair.
    pub fn vulnerability_count(&self) -> usize {
        self.vulnerable_dependencies.len()
    }

    pub fn high_severity_count(&self) -> usize {
        self.vulnerable_dependencies
            .iter()
            .filter(|vd| vd.severity().is_high())
            .count()
    }
}

pub struct Analyzer {
    predicate: Box<dyn VersionPredicate>,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            predicate: Box::new(AlwaysAffected),
        }
    }

    pub fn with_predicate(predicate: impl VersionPredicate + 'static) -> Self {
        Self {
            predicate: Box::new(predicate),
        }
    }

    pub fn analyze(
        &self,
        dependencies: &[Dependency],
        vulnerabilities: &[VulnerabilityRecord],
    ) -> Analysis {
        let mut vulnerable = Vec::new();

        for dependency in dependencies {
            for vulnerability in vulnerabilities
                .iter()
                .filter(|v| v.package_name == dependency.name)
            {
                if !self
                    .predicate
                    .is_affected(&dependency.version, &vulnerability.affected_versions)
                {
                    continue;
                }
                vulnerable.push(VulnerableDependency {
                    dependency: dependency.clone(),
                    vulnerability: vulnerability.clone(),
                    recommended_fix: suggest_fix(dependency, vulnerability),
                });
            }
        }

        Analysis::new(vulnerable)
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

pub fn suggest_fix(dependency: &Dependency, vulnerability: &VulnerabilityRecord) -> String {
    match vulnerability.latest_fix() {
        Some(version) => format!(
            "bundle update {} {} {}",
            dependency.name, FIX_VERSION_MARKER, version
        ),
        None => format!("bundle update {}", dependency.name),
    }
}
