use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::FIX_VERSION_MARKER;
use crate::analysis::VulnerableDependency;

static FIX_VERSION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"{}\s+(\S+)", regex::escape(FIX_VERSION_MARKER))).unwrap()
});

static VERSION_SHAPE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?").unwrap());

/// A single planned upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixPlanEntry {
    pub gem_name: String,
    pub current_version: String,
    pub target_version: String,
    pub vulnerability_id: String,
    /// Severity as published by the advisory.
    pub severity: String,
}

/// Target version named in a fix command such as
/// `bundle update nokogiri --to 1.18.9`.
pub fn extract_version_from_fix(fix_command: &str) -> Option<&str> {
    FIX_VERSION_RE
        .captures(fix_command)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// `digits.digits` optionally followed by `.digits`.
pub fn looks_like_version(version: &str) -> bool {
    VERSION_SHAPE_RE.is_match(version)
}

/// Plan entries for every vulnerable dependency with a usable target version.
pub fn plan_fixes(vulnerable: &[VulnerableDependency]) -> Vec<FixPlanEntry> {
    vulnerable
        .iter()
        .filter_map(|vd| {
            let target = extract_version_from_fix(&vd.recommended_fix)?;
            if !looks_like_version(target) {
                tracing::debug!(
                    gem = %vd.dependency.name,
                    target_version = target,
                    "skipping fix with unrecognised target version"
                );
                return None;
            }
            Some(FixPlanEntry {
                gem_name: vd.dependency.name.clone(),
                current_version: vd.dependency.version.clone(),
                target_version: target.to_string(),
                vulnerability_id: vd.vulnerability.id.clone(),
                severity: vd.vulnerability.severity.clone(),
            })
        })
        .collect()
}
