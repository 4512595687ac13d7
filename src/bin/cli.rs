use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gemguard::config::{Config, DEFAULT_CONFIG_FILE};
use gemguard::error::{GuardError, Result};
use gemguard::fix::{AutoFixer, FixOptions, FixStatus};
use gemguard::output::{self, OutputFormat};
use gemguard::sbom::{SbomFormat, SbomGenerator};
use gemguard::Scanner;

#[derive(Parser)]
#[command(
    name = "gemguard",
    about = "Security scanner for Ruby Gemfile.lock files",
    version,
    author
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Common {
    /// Config file path
    #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Path to Gemfile.lock (overrides config)
    #[arg(long, short = 'l')]
    lockfile: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(long, short = 'f')]
    format: Option<String>,

    /// Write output to file instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan Gemfile.lock for known vulnerabilities and suspicious gem names
    Scan {
        #[command(flatten)]
        common: Common,

        /// Extra JSON advisory list to check against
        #[arg(long)]
        advisories: Option<PathBuf>,

        /// Skip the typosquat check
        #[arg(long)]
        no_typosquat: bool,

        /// Exit 0 even when vulnerabilities are found
        #[arg(long)]
        no_fail: bool,
    },

    /// Upgrade vulnerable gems through Bundler
    Fix {
        #[command(flatten)]
        common: Common,

        /// Path to Gemfile (overrides config)
        #[arg(long, short = 'g')]
        gemfile: Option<PathBuf>,

        /// Extra JSON advisory list to check against
        #[arg(long)]
        advisories: Option<PathBuf>,

        /// Show planned fixes without applying them
        #[arg(long)]
        dry_run: bool,

        /// Confirm the plan before applying
        #[arg(long, short = 'i')]
        interactive: bool,

        /// Do not back up Gemfile.lock before upgrading
        #[arg(long)]
        no_backup: bool,
    },

    /// Check gem names against popular gems for likely typosquats
    Typosquat {
        #[command(flatten)]
        common: Common,

        /// Endpoint returning [{"name", "downloads"}] (overrides config)
        #[arg(long)]
        popular_gems_url: Option<String>,
    },

    /// Generate a Software Bill of Materials
    Sbom {
        /// Config file path
        #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Path to Gemfile.lock (overrides config)
        #[arg(long, short = 'l')]
        lockfile: Option<PathBuf>,

        /// SBOM format (spdx, cyclonedx)
        #[arg(long, short = 'f')]
        format: Option<String>,

        /// Project name for the root component
        #[arg(long)]
        project: Option<String>,

        /// Write output to file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Generate a starter .gemguard.toml config file
    Init {
        /// Config file path to create
        #[arg(long, short = 'c', default_value = DEFAULT_CONFIG_FILE)]
        config: PathBuf,

        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Scan {
            common,
            advisories,
            no_typosquat,
            no_fail,
        } => cmd_scan(common, advisories, no_typosquat, no_fail),
        Commands::Fix {
            common,
            gemfile,
            advisories,
            dry_run,
            interactive,
            no_backup,
        } => cmd_fix(
            common,
            gemfile,
            advisories,
            FixOptions {
                dry_run,
                interactive,
                backup: !no_backup,
            },
        ),
        Commands::Typosquat {
            common,
            popular_gems_url,
        } => cmd_typosquat(common, popular_gems_url),
        Commands::Sbom {
            config,
            lockfile,
            format,
            project,
            output,
        } => cmd_sbom(config, lockfile, format, project, output),
        Commands::Init { config, force } => cmd_init(config, force),
    };

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(e.exit_code());
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Load config and apply the flags every command shares.
fn load_config(common: &Common) -> Result<(Config, OutputFormat)> {
    let mut config = Config::load(&common.config)?;
    if let Some(lockfile) = &common.lockfile {
        config.lockfile = lockfile.clone();
    }
    let format = match &common.format {
        Some(s) => OutputFormat::from_str_lenient(s).unwrap_or_else(|| {
            eprintln!("Warning: unknown format '{}', using {}", s, config.format);
            config.format
        }),
        None => config.format,
    };
    Ok((config, format))
}

fn add_advisory_file(config: &mut Config, advisories: Option<PathBuf>) {
    if let Some(path) = advisories {
        config.scan.advisory_file = Some(path);
        if !config.scan.sources.iter().any(|s| s == "file") {
            config.scan.sources.push("file".into());
        }
    }
}

fn require_lockfile(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(GuardError::file(path, "not found"));
    }
    Ok(())
}

fn cmd_scan(
    common: Common,
    advisories: Option<PathBuf>,
    no_typosquat: bool,
    no_fail: bool,
) -> Result<i32> {
    let (mut config, format) = load_config(&common)?;
    add_advisory_file(&mut config, advisories);
    if no_typosquat {
        config.typosquat.enabled = false;
    }
    if no_fail {
        config.policy.fail_on_vulnerabilities = false;
    }
    require_lockfile(&config.lockfile)?;

    let mut scanner = Scanner::from_config(&config)?;
    let report = scanner.scan(&config.lockfile)?;
    let rendered = gemguard::render_report(&report, format)?;
    output::emit(&rendered, common.output.as_deref())?;

    // Exit code: 0 = clean or allowed, 1 = vulnerabilities remain
    Ok(if scanner.policy().fails(&report.analysis) { 1 } else { 0 })
}

fn cmd_fix(
    common: Common,
    gemfile: Option<PathBuf>,
    advisories: Option<PathBuf>,
    mut options: FixOptions,
) -> Result<i32> {
    let (mut config, format) = load_config(&common)?;
    add_advisory_file(&mut config, advisories);
    if let Some(gemfile) = gemfile {
        config.gemfile = gemfile;
    }
    config.typosquat.enabled = false;
    options.backup &= config.fix.backup;
    require_lockfile(&config.lockfile)?;

    let report = Scanner::from_config(&config)?.scan(&config.lockfile)?;
    let mut fixer = AutoFixer::new(&config.lockfile, &config.gemfile);
    let result = fixer.fix_vulnerabilities(&report.analysis.vulnerable_dependencies, options)?;

    let rendered = output::render_fix(&result, format)?;
    output::emit(&rendered, common.output.as_deref())?;

    Ok(match result.status {
        FixStatus::Completed if !result.failures.is_empty() => 1,
        _ => 0,
    })
}

fn cmd_typosquat(common: Common, popular_gems_url: Option<String>) -> Result<i32> {
    let (mut config, format) = load_config(&common)?;
    if popular_gems_url.is_some() {
        config.typosquat.popular_gems_url = popular_gems_url;
    }
    config.typosquat.enabled = true;
    config.scan.sources.clear();
    require_lockfile(&config.lockfile)?;

    let report = Scanner::from_config(&config)?.scan(&config.lockfile)?;
    let rendered = output::render_typosquats(&report.typosquats, format)?;
    output::emit(&rendered, common.output.as_deref())?;

    Ok(if report.typosquats.is_empty() { 0 } else { 1 })
}

fn cmd_sbom(
    config_path: PathBuf,
    lockfile: Option<PathBuf>,
    format: Option<String>,
    project: Option<String>,
    output_path: Option<PathBuf>,
) -> Result<i32> {
    let mut config = Config::load(&config_path)?;
    if let Some(lockfile) = lockfile {
        config.lockfile = lockfile;
    }
    if project.is_some() {
        config.project_name = project;
    }
    let format = match format {
        Some(s) => SbomFormat::from_str_lenient(&s).ok_or_else(|| {
            GuardError::Config(format!(
                "unsupported SBOM format '{}'; use 'spdx' or 'cyclonedx'",
                s
            ))
        })?,
        None => config.sbom.format,
    };
    require_lockfile(&config.lockfile)?;

    let parser = gemguard::parser::LockfileParser::new()
        .with_dependency_validation(config.parser.validate_dependencies);
    let dependencies = parser.parse(&config.lockfile)?;
    let document =
        SbomGenerator::new().render(&dependencies, &config.project_name(), format)?;

    output::emit(&document, output_path.as_deref())?;
    if let Some(path) = &output_path {
        eprintln!("SBOM written to {}", path.display());
    }
    Ok(0)
}

fn cmd_init(config: PathBuf, force: bool) -> Result<i32> {
    if !Config::write_starter(&config, force)? {
        eprintln!("{} already exists. Use --force to overwrite.", config.display());
        return Ok(1);
    }

    println!("Created {}", config.display());
    Ok(0)
}
