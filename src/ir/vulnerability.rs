use serde::{Deserialize, Serialize};

/// A published advisory against a single gem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    /// Advisory identifier (CVE, GHSA, OSV id).
    pub id: String,
    pub package_name: String,
    /// Severity as published; classify with [`VulnerabilityRecord::severity_level`].
    pub severity: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub affected_versions: Vec<String>,
    /// Ascending; the last element is the latest known fix.
    #[serde(default)]
    pub fixed_versions: Vec<String>,
}

impl VulnerabilityRecord {
    pub fn new(
        id: impl Into<String>,
        package_name: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            package_name: package_name.into(),
            severity: severity.into(),
            summary: String::new(),
            details: String::new(),
            affected_versions: Vec::new(),
            fixed_versions: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_fixed_versions<I, S>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fixed_versions = versions.into_iter().map(Into::into).collect();
        self
    }

    pub fn severity_level(&self) -> Severity {
        Severity::classify(&self.severity)
    }

    pub fn latest_fix(&self) -> Option<&str> {
        self.fixed_versions.last().map(String::as_str)
    }
}

/// Classified severity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unknown,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive substring classification of a published severity.
    pub fn classify(raw: &str) -> Self {
        let upper = raw.to_uppercase();
        if upper.contains("CRITICAL") {
            Self::Critical
        } else if upper.contains("HIGH") {
            Self::High
        } else if upper.contains("MEDIUM") || upper.contains("MODERATE") {
            Self::Medium
        } else if upper.contains("LOW") {
            Self::Low
        } else {
            Self::Unknown
        }
    }

    /// Strict parse for config values and CLI flags.
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" | "med" | "moderate" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" | "crit" => Some(Self::Critical),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }

    pub fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }

    /// Fixed-width console marker, e.g. `[HIGH]    `.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Critical => "[CRITICAL]",
            Self::High => "[HIGH]    ",
            Self::Medium => "[MEDIUM]  ",
            Self::Low => "[LOW]     ",
            Self::Unknown => "[UNKNOWN] ",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => write!(f, "unknown"),
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}
