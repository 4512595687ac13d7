//! Software bill of materials generation.
//!
//! Both documents list every locked gem with its package URL and
//! rubygems.org download location. Creation timestamps come from the
//! [`SbomGenerator`] so one run stamps both formats identically.

pub mod cyclonedx;
pub mod spdx;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ir::Dependency;

pub const TOOL_NAME: &str = "gemguard";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SbomFormat {
    #[default]
    #[serde(rename = "spdx")]
    Spdx,
    #[serde(rename = "cyclonedx", alias = "cyclone-dx")]
    CycloneDx,
}

impl SbomFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "spdx" => Some(Self::Spdx),
            "cyclonedx" | "cyclone-dx" | "cdx" => Some(Self::CycloneDx),
            _ => None,
        }
    }
}

impl std::fmt::Display for SbomFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spdx => write!(f, "spdx"),
            Self::CycloneDx => write!(f, "cyclonedx"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SbomGenerator {
    created: DateTime<Utc>,
}

impl Default for SbomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl SbomGenerator {
    pub fn new() -> Self {
        Self::at(Utc::now())
    }

    pub fn at(created: DateTime<Utc>) -> Self {
        Self { created }
    }

    fn timestamp(&self) -> String {
        self.created.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Render the document for `format` as pretty JSON.
    pub fn render(
        &self,
        dependencies: &[Dependency],
        project_name: &str,
        format: SbomFormat,
    ) -> Result<String> {
        let document = match format {
            SbomFormat::Spdx => spdx::document(dependencies, project_name, &self.timestamp()),
            SbomFormat::CycloneDx => {
                cyclonedx::document(dependencies, project_name, &self.timestamp())
            }
        };
        tracing::debug!(%format, components = dependencies.len(), "generated SBOM");
        Ok(serde_json::to_string_pretty(&document)?)
    }
}

pub(crate) fn gem_download_url(dep: &Dependency) -> String {
    format!("https://rubygems.org/downloads/{}-{}.gem", dep.name, dep.version)
}

pub(crate) fn gem_homepage_url(dep: &Dependency) -> String {
    format!("https://rubygems.org/gems/{}", dep.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::DEFAULT_SOURCE;
    use chrono::TimeZone;

    #[test]
    fn lenient_format_names() {
        assert_eq!(SbomFormat::from_str_lenient("SPDX"), Some(SbomFormat::Spdx));
        assert_eq!(SbomFormat::from_str_lenient("cyclone-dx"), Some(SbomFormat::CycloneDx));
        assert_eq!(SbomFormat::from_str_lenient("cyclonedx"), Some(SbomFormat::CycloneDx));
        assert_eq!(SbomFormat::from_str_lenient("swid"), None);
    }

    #[test]
    fn timestamps_are_utc_seconds() {
        let generator = SbomGenerator::at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        assert_eq!(generator.timestamp(), "2024-03-01T12:30:00Z");
    }

    #[test]
    fn rubygems_urls() {
        let dep = Dependency::new("rack", "2.2.3", DEFAULT_SOURCE);
        assert_eq!(gem_download_url(&dep), "https://rubygems.org/downloads/rack-2.2.3.gem");
        assert_eq!(gem_homepage_url(&dep), "https://rubygems.org/gems/rack");
    }

    #[test]
    fn render_is_json() {
        let deps = vec![Dependency::new("rack", "2.2.3", DEFAULT_SOURCE)];
        let out = SbomGenerator::new()
            .render(&deps, "demo", SbomFormat::CycloneDx)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["bomFormat"], "CycloneDX");
    }
}
