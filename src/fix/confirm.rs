//! Operator approval of a fix plan.

use std::io::{self, BufRead, Write};

use super::plan::FixPlanEntry;
use crate::error::Result;
use crate::ir::Severity;

/// Chooses which planned fixes to apply. An empty selection cancels.
pub trait FixSelector {
    fn select(&mut self, candidates: &[FixPlanEntry]) -> Result<Vec<FixPlanEntry>>;
}

/// Approves every candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

impl FixSelector for ApproveAll {
    fn select(&mut self, candidates: &[FixPlanEntry]) -> Result<Vec<FixPlanEntry>> {
        Ok(candidates.to_vec())
    }
}

/// Prints the plan and asks a yes/no question; "yes" approves the whole plan.
pub struct PromptSelector<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> PromptSelector<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> FixSelector for PromptSelector<R, W> {
    fn select(&mut self, candidates: &[FixPlanEntry]) -> Result<Vec<FixPlanEntry>> {
        writeln!(self.output, "\nPlanned fixes:")?;
        writeln!(self.output, "{}", "=".repeat(50))?;
        for fix in candidates {
            writeln!(
                self.output,
                "{} {}: {} -> {}",
                Severity::classify(&fix.severity).tag(),
                fix.gem_name,
                fix.current_version,
                fix.target_version
            )?;
            writeln!(self.output, "    fixes: {}", fix.vulnerability_id)?;
        }
        writeln!(
            self.output,
            "\nThis will modify your Gemfile.lock and may require bundle install."
        )?;
        write!(self.output, "Do you want to proceed? (y/N): ")?;
        self.output.flush()?;

        let mut answer = String::new();
        self.input.read_line(&mut answer)?;
        let answer = answer.trim().to_lowercase();

        if answer == "y" || answer == "yes" {
            Ok(candidates.to_vec())
        } else {
            Ok(Vec::new())
        }
    }
}

/// [`PromptSelector`] reading stdin and writing to stderr, locked only
/// while the question is asked.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdioPrompt;

impl StdioPrompt {
    fn selector() -> PromptSelector<io::StdinLock<'static>, io::StderrLock<'static>> {
        PromptSelector::new(io::stdin().lock(), io::stderr().lock())
    }
}

impl FixSelector for StdioPrompt {
    fn select(&mut self, candidates: &[FixPlanEntry]) -> Result<Vec<FixPlanEntry>> {
        Self::selector().select(candidates)
    }
}
