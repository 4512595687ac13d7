pub mod policy;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::adapter::osv::DEFAULT_OSV_API_BASE;
use crate::analysis::FallbackPolicy;
use crate::error::{GuardError, Result};
use crate::output::OutputFormat;
use crate::sbom::SbomFormat;

pub use policy::Policy;

pub const DEFAULT_CONFIG_FILE: &str = ".gemguard.toml";

/// Top-level configuration from `.gemguard.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub lockfile: PathBuf,
    pub gemfile: PathBuf,
    pub format: OutputFormat,
    /// Root component name for SBOM documents; defaults to the project directory name.
    pub project_name: Option<String>,
    pub policy: Policy,
    pub scan: ScanConfig,
    pub typosquat: TyposquatConfig,
    pub parser: ParserConfig,
    pub fix: FixConfig,
    pub sbom: SbomConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            lockfile: PathBuf::from("Gemfile.lock"),
            gemfile: PathBuf::from("Gemfile"),
            format: OutputFormat::Table,
            project_name: None,
            policy: Policy::default(),
            scan: ScanConfig::default(),
            typosquat: TyposquatConfig::default(),
            parser: ParserConfig::default(),
            fix: FixConfig::default(),
            sbom: SbomConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Advisory sources to query, in order ("osv", "file").
    pub sources: Vec<String>,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    pub osv_api_url: String,
    /// JSON advisory list used by the "file" source.
    pub advisory_file: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sources: vec!["osv".into()],
            timeout: 30,
            osv_api_url: DEFAULT_OSV_API_BASE.into(),
            advisory_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TyposquatConfig {
    pub enabled: bool,
    /// Endpoint serving `[{"name", "downloads"}]`; the built-in corpus is used when unset.
    pub popular_gems_url: Option<String>,
    pub fallback: FallbackPolicy,
}

impl Default for TyposquatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            popular_gems_url: None,
            fallback: FallbackPolicy::Silent,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Require every DEPENDENCIES entry to resolve to a spec.
    pub validate_dependencies: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixConfig {
    pub backup: bool,
}

impl Default for FixConfig {
    fn default() -> Self {
        Self { backup: true }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SbomConfig {
    pub format: SbomFormat,
}

impl Config {
    /// Load config from a TOML file. Returns default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan.timeout == 0 {
            return Err(GuardError::Config("scan.timeout must be positive".into()));
        }
        Url::parse(&self.scan.osv_api_url).map_err(|e| {
            GuardError::Config(format!("scan.osv_api_url '{}': {}", self.scan.osv_api_url, e))
        })?;
        if let Some(url) = &self.typosquat.popular_gems_url {
            Url::parse(url).map_err(|e| {
                GuardError::Config(format!("typosquat.popular_gems_url '{}': {}", url, e))
            })?;
        }
        for source in &self.scan.sources {
            match source.as_str() {
                "osv" => {}
                "file" if self.scan.advisory_file.is_some() => {}
                "file" => {
                    return Err(GuardError::Config(
                        "scan.sources includes \"file\" but scan.advisory_file is not set".into(),
                    ))
                }
                other => {
                    return Err(GuardError::Config(format!("unknown advisory source '{}'", other)))
                }
            }
        }
        Ok(())
    }

    /// SBOM root name: configured name, else the lock file's directory name.
    pub fn project_name(&self) -> String {
        if let Some(name) = &self.project_name {
            return name.clone();
        }
        std::fs::canonicalize(&self.lockfile)
            .ok()
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ruby-project".into())
    }

    /// Write the starter config to `path`. Returns `false` without touching
    /// an existing file unless `force` is set.
    pub fn write_starter(path: &Path, force: bool) -> Result<bool> {
        if path.exists() && !force {
            return Ok(false);
        }
        std::fs::write(path, Self::starter_toml())
            .map_err(|e| GuardError::file(path, format!("cannot write config: {}", e)))?;
        Ok(true)
    }

    /// Generate a starter config file.
    pub fn starter_toml() -> &'static str {
        r#"# gemguard configuration

lockfile = "Gemfile.lock"
gemfile = "Gemfile"
# Output format for scan results (table, json).
format = "table"
# project_name = "my-app"

[policy]
# Exit non-zero when vulnerabilities remain after filtering.
fail_on_vulnerabilities = true
# Minimum severity to report (low, medium, high, critical).
severity_threshold = "low"
# ignore_vulnerabilities = ["CVE-2021-22885"]
# ignore_gems = ["rexml"]

[scan]
sources = ["osv"]
timeout = 30
# advisory_file = "advisories.json"

[typosquat]
enabled = true
# popular_gems_url = "https://example.com/popular-gems.json"
# Report popularity fetch failures (silent, logged).
fallback = "silent"

[parser]
validate_dependencies = false

[fix]
backup = true

[sbom]
format = "spdx"
"#
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Severity;
    use std::io::Write;

    #[test]
    fn missing_file_gives_defaults() {
        let config = Config::load(Path::new("/nonexistent/.gemguard.toml")).unwrap();
        assert_eq!(config.lockfile, PathBuf::from("Gemfile.lock"));
        assert!(config.policy.fail_on_vulnerabilities);
        assert_eq!(config.scan.sources, vec!["osv"]);
        assert!(config.fix.backup);
        assert_eq!(config.typosquat.fallback, FallbackPolicy::Silent);
    }

    #[test]
    fn starter_config_round_trips() {
        let config: Config = toml::from_str(Config::starter_toml()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.policy.severity_threshold, Severity::Low);
        assert_eq!(config.sbom.format, SbomFormat::Spdx);
    }

    #[test]
    fn partial_file_merges_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "format = \"json\"\n[policy]\nseverity_threshold = \"high\"\nignore_gems = [\"rexml\"]\n[typosquat]\nfallback = \"logged\""
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.format, OutputFormat::Json);
        assert_eq!(config.policy.severity_threshold, Severity::High);
        assert!(config.policy.ignore_gems.contains("rexml"));
        assert!(config.policy.fail_on_vulnerabilities);
        assert_eq!(config.typosquat.fallback, FallbackPolicy::Logged);
        assert_eq!(config.scan.timeout, 30);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "format = [").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(GuardError::Toml(_))
        ));
    }

    #[test]
    fn starter_written_to_chosen_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ci").join("gemguard.toml");
        std::fs::create_dir(path.parent().unwrap()).unwrap();

        assert!(Config::write_starter(&path, false).unwrap());
        assert!(Config::load(&path).is_ok());

        std::fs::write(&path, "format = \"json\"\n").unwrap();
        assert!(!Config::write_starter(&path, false).unwrap());
        assert_eq!(Config::load(&path).unwrap().format, OutputFormat::Json);

        assert!(Config::write_starter(&path, true).unwrap());
        assert_eq!(Config::load(&path).unwrap().format, OutputFormat::Table);
    }

    #[test]
    fn rejects_unknown_source() {
        let mut config = Config::default();
        config.scan.sources = vec!["nvd".into()];
        assert!(matches!(config.validate(), Err(GuardError::Config(_))));
    }

    #[test]
    fn file_source_needs_path() {
        let mut config = Config::default();
        config.scan.sources = vec!["file".into()];
        assert!(config.validate().is_err());
        config.scan.advisory_file = Some(PathBuf::from("advisories.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn configured_project_name_wins() {
        let config = Config {
            project_name: Some("storefront".into()),
            ..Default::default()
        };
        assert_eq!(config.project_name(), "storefront");
    }
}
