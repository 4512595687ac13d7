//! gem-guard: security scanner for Ruby `Gemfile.lock` files.
//!
//! Parses the lock file, matches locked gems against advisories, flags
//! names that look like typos of popular gems, and can apply upgrades
//! through Bundler. SBOMs are available in SPDX and CycloneDX.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use gemguard::{config::Config, scan};
//!
//! let config = Config::load(Path::new(".gemguard.toml")).unwrap();
//! let report = scan(Path::new("Gemfile.lock"), &config).unwrap();
//! println!("Vulnerabilities: {}", report.analysis.vulnerability_count());
//! ```

pub mod adapter;
pub mod analysis;
pub mod config;
pub mod error;
pub mod fix;
pub mod ir;
pub mod output;
pub mod parser;
pub mod sbom;

use std::path::Path;
use std::time::Duration;

use adapter::{AdvisorySource, FileAdvisorySource, OsvAdvisorySource, RemotePopularity};
use analysis::{Analysis, Analyzer, TyposquatChecker, TyposquatMatch};
use config::{Config, Policy};
use error::{GuardError, Result};
use ir::Dependency;
use output::OutputFormat;
use parser::LockfileParser;

/// Complete scan report, after policy filtering.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub dependencies: Vec<Dependency>,
    pub analysis: Analysis,
    pub typosquats: Vec<TyposquatMatch>,
}

/// Parse, fetch advisories, analyze, check names, filter.
pub struct Scanner {
    parser: LockfileParser,
    analyzer: Analyzer,
    sources: Vec<Box<dyn AdvisorySource>>,
    typosquat: Option<TyposquatChecker>,
    policy: Policy,
}

impl Scanner {
    /// Scanner over `sources` with an offline typosquat checker and the default policy.
    pub fn new(sources: Vec<Box<dyn AdvisorySource>>) -> Self {
        Self {
            parser: LockfileParser::new(),
            analyzer: Analyzer::new(),
            sources,
            typosquat: Some(TyposquatChecker::offline()),
            policy: Policy::default(),
        }
    }

    /// Build sources, checker and policy from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.scan.timeout);
        let mut sources: Vec<Box<dyn AdvisorySource>> = Vec::new();
        for name in &config.scan.sources {
            match name.as_str() {
                "osv" => sources.push(Box::new(OsvAdvisorySource::new(
                    &config.scan.osv_api_url,
                    timeout,
                ))),
                "file" => {
                    let path = config.scan.advisory_file.as_ref().ok_or_else(|| {
                        GuardError::Config("\"file\" source needs scan.advisory_file".into())
                    })?;
                    sources.push(Box::new(FileAdvisorySource::new(path)));
                }
                other => {
                    return Err(GuardError::Config(format!("unknown advisory source '{}'", other)))
                }
            }
        }

        let typosquat = config.typosquat.enabled.then(|| {
            let checker = match &config.typosquat.popular_gems_url {
                Some(url) => TyposquatChecker::new(Box::new(RemotePopularity::new(url, timeout))),
                None => TyposquatChecker::offline(),
            };
            checker.with_fallback_policy(config.typosquat.fallback)
        });

        Ok(Self::new(sources)
            .with_parser(
                LockfileParser::new().with_dependency_validation(config.parser.validate_dependencies),
            )
            .with_typosquat_checker(typosquat)
            .with_policy(config.policy.clone()))
    }

    pub fn with_parser(mut self, parser: LockfileParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Analyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    /// `None` disables the typosquat pass.
    pub fn with_typosquat_checker(mut self, checker: Option<TyposquatChecker>) -> Self {
        self.typosquat = checker;
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn scan(&mut self, lockfile: &Path) -> Result<ScanReport> {
        let dependencies = self.parser.parse(lockfile)?;
        tracing::info!(
            lockfile = %lockfile.display(),
            gems = dependencies.len(),
            "parsed lock file"
        );

        let advisories = adapter::fetch_all(&self.sources, &dependencies);
        let analysis = self.analyzer.analyze(&dependencies, &advisories);
        let analysis = self.policy.apply(&analysis);

        let typosquats = match self.typosquat.as_mut() {
            Some(checker) => self
                .policy
                .apply_typosquats(checker.check_dependencies(&dependencies)),
            None => Vec::new(),
        };

        Ok(ScanReport {
            dependencies,
            analysis,
            typosquats,
        })
    }
}

/// Run a complete scan with sources and policy taken from `config`.
pub fn scan(lockfile: &Path, config: &Config) -> Result<ScanReport> {
    Scanner::from_config(config)?.scan(lockfile)
}

/// Render a scan report in the specified format.
pub fn render_report(report: &ScanReport, format: OutputFormat) -> Result<String> {
    output::render_scan(report, format)
}
