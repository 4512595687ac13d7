pub mod console;
pub mod json;

use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::TyposquatMatch;
use crate::error::{GuardError, Result};
use crate::fix::FixResult;
use crate::ScanReport;

/// Output format selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "console")]
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_lenient(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" | "console" | "text" => Some(Self::Table),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Render a scan report into the specified format.
pub fn render_scan(report: &ScanReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(console::render_scan(report)),
        OutputFormat::Json => json::render_scan(report),
    }
}

pub fn render_fix(result: &FixResult, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(console::render_fix(result)),
        OutputFormat::Json => json::render_fix(result),
    }
}

pub fn render_typosquats(matches: &[TyposquatMatch], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Table => Ok(console::render_typosquats(matches)),
        OutputFormat::Json => json::render_typosquats(matches),
    }
}

/// Write rendered output to `path`, or stdout when no path is given.
pub fn emit(content: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, content).map_err(|e| {
            GuardError::Output(format!("cannot write {}: {}", path.display(), e))
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", content)
                .map_err(|e| GuardError::Output(format!("cannot write to stdout: {}", e)))
        }
    }
}
