use serde::{Deserialize, Serialize};

/// Registry used when a lock file entry does not declare its own remote.
pub const DEFAULT_SOURCE: &str = "https://rubygems.org";

/// A resolved gem pinned by the lock file.
///
/// Two dependencies are equal when name, version and source match; the
/// nested dependency names do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// Free-form gem version, platform suffix already stripped.
    pub version: String,
    /// Registry or repository URI the gem resolves from.
    pub source: String,
    /// Direct dependency names, in lock file order.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl Dependency {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source: source.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = names.into_iter().map(Into::into).collect();
        self
    }

    /// Package URL for SBOM references.
    pub fn purl(&self) -> String {
        format!("pkg:gem/{}@{}", self.name, self.version)
    }
}

impl PartialEq for Dependency {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.version == other.version && self.source == other.source
    }
}

impl Eq for Dependency {}
