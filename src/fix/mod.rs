//! Remediation of vulnerable dependencies.
//!
//! [`AutoFixer::fix_vulnerabilities`] moves through
//! `planning -> {no fixes | dry run | awaiting selection -> (cancelled | applying -> completed)}`.
//! Only the applying branch touches the filesystem, and the lock file
//! backup is written before the first upgrade runs.

pub mod backup;
pub mod bundler;
pub mod confirm;
pub mod plan;

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::analysis::VulnerableDependency;
use crate::error::{GuardError, Result};

pub use bundler::{BundlerCli, PackageManager};
pub use confirm::{ApproveAll, FixSelector, PromptSelector, StdioPrompt};
pub use plan::{plan_fixes, FixPlanEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixStatus {
    NoFixesNeeded,
    DryRun,
    Cancelled,
    Completed,
}

impl std::fmt::Display for FixStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoFixesNeeded => write!(f, "no_fixes_needed"),
            Self::DryRun => write!(f, "dry_run"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixOptions {
    /// Plan only; never touch the filesystem.
    pub dry_run: bool,
    /// Ask the selector which fixes to apply.
    pub interactive: bool,
    /// Back up the lock file before the first upgrade.
    pub backup: bool,
}

impl Default for FixOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            interactive: false,
            backup: true,
        }
    }
}

/// An approved fix whose upgrade command failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixFailure {
    pub fix: FixPlanEntry,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FixResult {
    pub status: FixStatus,
    /// Planned fixes for `dry_run`, applied fixes for `completed`.
    pub fixes: Vec<FixPlanEntry>,
    pub failures: Vec<FixFailure>,
    pub backup_path: Option<PathBuf>,
    /// Whether the post-upgrade relock succeeded; `None` when it did not run.
    pub relocked: Option<bool>,
    pub message: String,
}

impl FixResult {
    fn new(status: FixStatus, fixes: Vec<FixPlanEntry>, message: String) -> Self {
        Self {
            status,
            fixes,
            failures: Vec::new(),
            backup_path: None,
            relocked: None,
            message,
        }
    }
}

pub struct AutoFixer {
    lockfile_path: PathBuf,
    gemfile_path: PathBuf,
    package_manager: Box<dyn PackageManager>,
    selector: Box<dyn FixSelector>,
    backup_path: Option<PathBuf>,
}

impl AutoFixer {
    /// Fixer driving `bundle` and prompting on stdin/stdout.
    pub fn new(lockfile_path: impl AsRef<Path>, gemfile_path: impl AsRef<Path>) -> Self {
        let gemfile_path = gemfile_path.as_ref().to_path_buf();
        Self {
            lockfile_path: lockfile_path.as_ref().to_path_buf(),
            package_manager: Box::new(BundlerCli::new(&gemfile_path)),
            selector: Box::new(StdioPrompt),
            gemfile_path,
            backup_path: None,
        }
    }

    pub fn with_package_manager(mut self, package_manager: Box<dyn PackageManager>) -> Self {
        self.package_manager = package_manager;
        self
    }

    pub fn with_selector(mut self, selector: Box<dyn FixSelector>) -> Self {
        self.selector = selector;
        self
    }

    /// Backup written by this fixer, if any.
    pub fn backup_path(&self) -> Option<&Path> {
        self.backup_path.as_deref()
    }

    pub fn fix_vulnerabilities(
        &mut self,
        vulnerable: &[VulnerableDependency],
        options: FixOptions,
    ) -> Result<FixResult> {
        self.check_preconditions()?;

        let plan = plan_fixes(vulnerable);
        tracing::debug!(planned = plan.len(), "planned fixes");

        if plan.is_empty() {
            return Ok(FixResult::new(
                FixStatus::NoFixesNeeded,
                Vec::new(),
                "No automatic fixes available.".into(),
            ));
        }

        if options.dry_run {
            let message = format!("Dry run completed. {} fixes planned.", plan.len());
            return Ok(FixResult::new(FixStatus::DryRun, plan, message));
        }

        let approved = if options.interactive {
            self.selector.select(&plan)?
        } else {
            plan
        };

        if approved.is_empty() {
            return Ok(FixResult::new(
                FixStatus::Cancelled,
                Vec::new(),
                "Fix operation cancelled by user.".into(),
            ));
        }

        if options.backup {
            self.ensure_backup()?;
        }

        let outcomes: Vec<(FixPlanEntry, Result<()>)> = approved
            .into_iter()
            .map(|fix| {
                let outcome = self.package_manager.upgrade(&fix.gem_name);
                match &outcome {
                    Ok(()) => tracing::info!(
                        gem = %fix.gem_name,
                        version = %fix.target_version,
                        "updated gem"
                    ),
                    Err(e) => tracing::warn!(gem = %fix.gem_name, error = %e, "failed to update gem"),
                }
                (fix, outcome)
            })
            .collect();

        let mut applied = Vec::new();
        let mut failures = Vec::new();
        for (fix, outcome) in outcomes {
            match outcome {
                Ok(()) => applied.push(fix),
                Err(e) => failures.push(FixFailure {
                    fix,
                    error: e.to_string(),
                }),
            }
        }

        let relocked = if applied.is_empty() {
            None
        } else {
            tracing::info!("relocking bundle");
            match self.package_manager.relock() {
                Ok(()) => Some(true),
                Err(e) => {
                    tracing::warn!(error = %e, "relock failed; lock file may be inconsistent");
                    Some(false)
                }
            }
        };

        let mut message = format!("Applied {} fixes successfully.", applied.len());
        if !failures.is_empty() {
            message.push_str(&format!(" {} fixes failed.", failures.len()));
        }

        Ok(FixResult {
            status: FixStatus::Completed,
            fixes: applied,
            failures,
            backup_path: if options.backup {
                self.backup_path.clone()
            } else {
                None
            },
            relocked,
            message,
        })
    }

    fn check_preconditions(&self) -> Result<()> {
        if !self.gemfile_path.exists() {
            return Err(GuardError::file(
                &self.gemfile_path,
                format!(
                    "Gemfile not found at {}. Auto-fix requires a Gemfile.",
                    self.gemfile_path.display()
                ),
            ));
        }
        if !self.lockfile_path.exists() {
            return Err(GuardError::file(
                &self.lockfile_path,
                format!(
                    "Gemfile.lock not found at {}. Run 'bundle install' first.",
                    self.lockfile_path.display()
                ),
            ));
        }
        Ok(())
    }

    fn ensure_backup(&mut self) -> Result<()> {
        if self.backup_path.is_none() {
            self.backup_path = Some(backup::create_backup(&self.lockfile_path)?);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Dependency, VulnerabilityRecord, DEFAULT_SOURCE};
    use pretty_assertions::assert_eq;
    use std::fs;
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    const GEMFILE: &str = "source \"https://rubygems.org\"\n\ngem \"nokogiri\", \"~> 1.18.0\"\ngem \"rails\", \"~> 7.0.0\"\n";

    const LOCKFILE: &str = "GEM
  remote: https://rubygems.org/
  specs:
    nokogiri (1.18.8)
    rails (7.0.4)

PLATFORMS
  ruby

DEPENDENCIES
  nokogiri (~> 1.18.0)
  rails (~> 7.0.0)

BUNDLED WITH
   2.4.10
";

    #[derive(Clone, Default)]
    struct FakeBundler {
        calls: Arc<Mutex<Vec<String>>>,
        failing: Vec<String>,
        lockfile: Option<PathBuf>,
    }

    impl FakeBundler {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl PackageManager for FakeBundler {
        fn upgrade(&self, gem_name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(format!("update {}", gem_name));
            if self.failing.iter().any(|g| g == gem_name) {
                return Err(GuardError::PackageManager {
                    command: format!("bundle update {} --conservative", gem_name),
                    message: "exited with exit status: 1".into(),
                });
            }
            if let Some(path) = &self.lockfile {
                let mut file = fs::OpenOptions::new().append(true).open(path).unwrap();
                writeln!(file, "# upgraded {}", gem_name).unwrap();
            }
            Ok(())
        }

        fn relock(&self) -> Result<()> {
            self.calls.lock().unwrap().push("install".into());
            Ok(())
        }
    }

    struct FixedSelection(Vec<String>);

    impl FixSelector for FixedSelection {
        fn select(&mut self, candidates: &[FixPlanEntry]) -> Result<Vec<FixPlanEntry>> {
            Ok(candidates
                .iter()
                .filter(|c| self.0.contains(&c.gem_name))
                .cloned()
                .collect())
        }
    }

    struct Workspace {
        dir: TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("Gemfile"), GEMFILE).unwrap();
            fs::write(dir.path().join("Gemfile.lock"), LOCKFILE).unwrap();
            Self { dir }
        }

        fn lockfile(&self) -> PathBuf {
            self.dir.path().join("Gemfile.lock")
        }

        fn gemfile(&self) -> PathBuf {
            self.dir.path().join("Gemfile")
        }

        fn backups(&self) -> Vec<PathBuf> {
            fs::read_dir(self.dir.path())
                .unwrap()
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.starts_with("Gemfile.lock.backup."))
                })
                .collect()
        }

        fn fixer(&self, bundler: &FakeBundler) -> AutoFixer {
            AutoFixer::new(self.lockfile(), self.gemfile())
                .with_package_manager(Box::new(bundler.clone()))
                .with_selector(Box::new(ApproveAll))
        }

        fn mutating_bundler(&self) -> FakeBundler {
            FakeBundler {
                lockfile: Some(self.lockfile()),
                ..Default::default()
            }
        }
    }

    fn vulnerable(name: &str, version: &str, target: &str) -> VulnerableDependency {
        VulnerableDependency {
            dependency: Dependency::new(name, version, DEFAULT_SOURCE),
            vulnerability: VulnerabilityRecord::new(format!("GHSA-{}", name), name, "HIGH"),
            recommended_fix: format!("bundle update {} --to {}", name, target),
        }
    }

    fn nokogiri() -> VulnerableDependency {
        vulnerable("nokogiri", "1.18.8", "1.18.9")
    }

    #[test]
    fn dry_run_plans_without_touching_disk() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(
                &[nokogiri()],
                FixOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(result.status, FixStatus::DryRun);
        assert_eq!(result.fixes[0].gem_name, "nokogiri");
        assert_eq!(result.fixes[0].current_version, "1.18.8");
        assert_eq!(result.fixes[0].target_version, "1.18.9");
        assert!(ws.backups().is_empty());
        assert_eq!(fs::read_to_string(ws.lockfile()).unwrap(), LOCKFILE);
        assert!(bundler.calls().is_empty());
    }

    #[test]
    fn nothing_to_fix() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[], FixOptions::default())
            .unwrap();

        assert_eq!(result.status, FixStatus::NoFixesNeeded);
        assert!(result.message.contains("No automatic fixes available"));
        assert!(ws.backups().is_empty());
    }

    #[test]
    fn untargeted_fixes_are_not_planned() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let mut untargeted = nokogiri();
        untargeted.recommended_fix = "bundle update nokogiri".into();

        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[untargeted], FixOptions::default())
            .unwrap();
        assert_eq!(result.status, FixStatus::NoFixesNeeded);
        assert!(bundler.calls().is_empty());
    }

    #[test]
    fn backs_up_before_applying() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap();

        assert_eq!(result.status, FixStatus::Completed);
        let backups = ws.backups();
        assert_eq!(backups.len(), 1);
        assert_eq!(result.backup_path.as_ref(), Some(&backups[0]));
        // The backup holds the pre-upgrade bytes.
        assert_eq!(fs::read_to_string(&backups[0]).unwrap(), LOCKFILE);
        assert_ne!(fs::read_to_string(ws.lockfile()).unwrap(), LOCKFILE);
        assert_eq!(bundler.calls(), vec!["update nokogiri", "install"]);
        assert_eq!(result.relocked, Some(true));
    }

    #[test]
    fn skips_backup_when_disabled() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(
                &[nokogiri()],
                FixOptions {
                    backup: false,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(result.status, FixStatus::Completed);
        assert!(ws.backups().is_empty());
        assert!(result.backup_path.is_none());
        assert_ne!(fs::read_to_string(ws.lockfile()).unwrap(), LOCKFILE);
    }

    #[test]
    fn empty_selection_cancels_without_backup() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let mut fixer = ws
            .fixer(&bundler)
            .with_selector(Box::new(FixedSelection(vec![])));

        let result = fixer
            .fix_vulnerabilities(
                &[nokogiri()],
                FixOptions {
                    interactive: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(result.status, FixStatus::Cancelled);
        assert!(result.fixes.is_empty());
        assert!(ws.backups().is_empty());
        assert_eq!(fs::read_to_string(ws.lockfile()).unwrap(), LOCKFILE);
        assert!(bundler.calls().is_empty());
    }

    #[test]
    fn interactive_applies_only_selected() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let mut fixer = ws
            .fixer(&bundler)
            .with_selector(Box::new(FixedSelection(vec!["rails".into()])));

        let result = fixer
            .fix_vulnerabilities(
                &[nokogiri(), vulnerable("rails", "7.0.4", "7.0.8.1")],
                FixOptions {
                    interactive: true,
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(result.status, FixStatus::Completed);
        assert_eq!(result.fixes.len(), 1);
        assert_eq!(result.fixes[0].gem_name, "rails");
        assert_eq!(bundler.calls(), vec!["update rails", "install"]);
    }

    #[test]
    fn partial_failure_keeps_going() {
        let ws = Workspace::new();
        let bundler = FakeBundler {
            failing: vec!["nokogiri".into()],
            ..ws.mutating_bundler()
        };

        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(
                &[nokogiri(), vulnerable("rails", "7.0.4", "7.0.8.1")],
                FixOptions::default(),
            )
            .unwrap();

        assert_eq!(result.status, FixStatus::Completed);
        assert_eq!(result.fixes.len(), 1);
        assert_eq!(result.fixes[0].gem_name, "rails");
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].fix.gem_name, "nokogiri");
        assert_eq!(
            bundler.calls(),
            vec!["update nokogiri", "update rails", "install"]
        );
        assert!(result.message.contains("1 fixes failed"));
    }

    #[test]
    fn no_relock_when_everything_fails() {
        let ws = Workspace::new();
        let bundler = FakeBundler {
            failing: vec!["nokogiri".into()],
            ..Default::default()
        };

        let result = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap();

        assert_eq!(result.status, FixStatus::Completed);
        assert!(result.fixes.is_empty());
        assert_eq!(result.relocked, None);
        assert_eq!(bundler.calls(), vec!["update nokogiri"]);
    }

    #[test]
    fn backup_happens_once_per_fixer() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();
        let mut fixer = ws.fixer(&bundler);

        fixer
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap();
        let first = fixer.backup_path().map(Path::to_path_buf);
        fixer
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap();

        assert_eq!(fixer.backup_path().map(Path::to_path_buf), first);
        assert_eq!(ws.backups().len(), 1);
        assert_eq!(fs::read_to_string(&ws.backups()[0]).unwrap(), LOCKFILE);
    }

    #[test]
    fn failed_backup_aborts_before_upgrades() {
        let dir = tempfile::tempdir().unwrap();
        let gemfile = dir.path().join("Gemfile");
        let lockfile = dir.path().join("Gemfile.lock");
        fs::write(&gemfile, GEMFILE).unwrap();
        // Exists, but cannot be read as a file.
        fs::create_dir(&lockfile).unwrap();

        let bundler = FakeBundler::default();
        let err = AutoFixer::new(&lockfile, &gemfile)
            .with_package_manager(Box::new(bundler.clone()))
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap_err();

        assert!(matches!(err, GuardError::File { .. }));
        assert!(bundler.calls().is_empty());
    }

    #[test]
    fn consecutive_fixers_keep_every_backup() {
        let ws = Workspace::new();
        let bundler = ws.mutating_bundler();

        let first = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap();
        let upgraded = fs::read_to_string(ws.lockfile()).unwrap();
        let second = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap();

        let first_backup = first.backup_path.unwrap();
        let second_backup = second.backup_path.unwrap();
        assert_ne!(first_backup, second_backup);
        assert_eq!(fs::read_to_string(&first_backup).unwrap(), LOCKFILE);
        assert_eq!(fs::read_to_string(&second_backup).unwrap(), upgraded);
        assert_eq!(ws.backups().len(), 2);
    }

    #[test]
    fn missing_gemfile_fails_fast() {
        let ws = Workspace::new();
        fs::remove_file(ws.gemfile()).unwrap();
        let bundler = ws.mutating_bundler();

        let err = ws
            .fixer(&bundler)
            .fix_vulnerabilities(&[nokogiri()], FixOptions::default())
            .unwrap_err();

        assert!(matches!(err, GuardError::File { .. }));
        assert!(err.to_string().contains("Gemfile not found"));
        assert!(bundler.calls().is_empty());
    }

    #[test]
    fn missing_lockfile_fails_fast() {
        let ws = Workspace::new();
        fs::remove_file(ws.lockfile()).unwrap();
        let bundler = ws.mutating_bundler();

        let err = ws
            .fixer(&bundler)
            .fix_vulnerabilities(
                &[nokogiri()],
                FixOptions {
                    dry_run: true,
                    ..Default::default()
                },
            )
            .unwrap_err();

        assert!(matches!(err, GuardError::File { .. }));
        assert!(err.to_string().contains("Gemfile.lock not found"));
    }
}
