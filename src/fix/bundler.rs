//! Package manager collaborator: single-gem upgrades and relocking.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{GuardError, Result};

/// Mutating package-manager operations used by the fixer.
pub trait PackageManager {
    /// Upgrade one gem, leaving unrelated gems untouched.
    fn upgrade(&self, gem_name: &str) -> Result<()>;

    /// Re-resolve the whole bundle so the lock file reflects all upgrades.
    fn relock(&self) -> Result<()>;
}

/// Shells out to `bundle` with the project's Gemfile.
#[derive(Debug, Clone)]
pub struct BundlerCli {
    program: String,
    gemfile: PathBuf,
    working_dir: PathBuf,
}

impl BundlerCli {
    pub fn new(gemfile: &Path) -> Self {
        let working_dir = gemfile
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        // BUNDLE_GEMFILE is resolved from the working directory, so pin it.
        let gemfile = std::fs::canonicalize(gemfile).unwrap_or_else(|_| gemfile.to_path_buf());
        Self {
            program: "bundle".into(),
            gemfile,
            working_dir,
        }
    }

    /// Use a different executable, e.g. a binstub.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run(&self, args: &[&str], quiet: bool) -> Result<()> {
        let rendered = format!("{} {}", self.program, args.join(" "));
        tracing::debug!(command = %rendered, dir = %self.working_dir.display(), "running bundler");

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .env("BUNDLE_GEMFILE", &self.gemfile)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        if quiet {
            cmd.stderr(Stdio::null());
        }

        let status = cmd.status().map_err(|e| GuardError::PackageManager {
            command: rendered.clone(),
            message: e.to_string(),
        })?;

        if status.success() {
            Ok(())
        } else {
            Err(GuardError::PackageManager {
                command: rendered,
                message: format!("exited with {}", status),
            })
        }
    }
}

impl PackageManager for BundlerCli {
    fn upgrade(&self, gem_name: &str) -> Result<()> {
        self.run(&["update", gem_name, "--conservative"], true)
    }

    fn relock(&self) -> Result<()> {
        self.run(&["install"], false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_dir_is_gemfile_parent() {
        let cli = BundlerCli::new(Path::new("/srv/app/Gemfile"));
        assert_eq!(cli.working_dir, PathBuf::from("/srv/app"));
        assert_eq!(BundlerCli::new(Path::new("Gemfile")).working_dir, PathBuf::from("."));
    }

    #[test]
    fn missing_program_is_package_manager_error() {
        let cli = BundlerCli::new(Path::new("Gemfile"))
            .with_program("gemguard-test-no-such-bundle-binary");
        let err = cli.upgrade("rack").unwrap_err();
        match err {
            GuardError::PackageManager { command, .. } => {
                assert!(command.contains("update rack --conservative"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
