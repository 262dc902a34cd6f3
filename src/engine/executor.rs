//! Execution engine - azstate executor with UI integration

use anyhow::{Result, bail};
use declarative::{
    AutoConfirm, ConfirmCallback, ExecuteOptions, ExecuteReport, ExecutionPlan, ProgressCallback,
    StateResult, execute,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

use super::output;
use crate::ui;

/// Options for a run (includes `yes` for confirmation skip)
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// No spinner or pending-change list
    pub quiet: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 1,
            yes: false,
            quiet: false,
            verbose: false,
        }
    }
}

/// Execute the plan with azstate's UI integration
pub fn run(plan: ExecutionPlan, opts: &RunOptions) -> Result<ExecuteReport> {
    let exec_opts = ExecuteOptions {
        dry_run: opts.dry_run,
        jobs: opts.jobs.max(1),
        verbose: opts.verbose,
    };
    log::info!(
        "reconciling {} resources ({} jobs{})",
        plan.total_resources(),
        exec_opts.jobs,
        if opts.dry_run { ", dry run" } else { "" }
    );

    let mut progress = TerminalProgress::new(!opts.quiet, !opts.dry_run);

    if opts.yes {
        execute(plan, exec_opts, &mut progress, &mut AutoConfirm)
    } else {
        execute(plan, exec_opts, &mut progress, &mut PromptConfirm)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Spinner while resources run, plus a list of pending changes
/// before the confirmation prompt
struct TerminalProgress {
    enabled: bool,
    /// Show pending changes from the preview pass (not for `--dry-run`,
    /// whose preview is the final output)
    show_preview: bool,
    in_preview: bool,
    bar: Option<ProgressBar>,
    pending: Vec<String>,
}

impl TerminalProgress {
    fn new(enabled: bool, show_preview: bool) -> Self {
        Self {
            enabled,
            show_preview,
            in_preview: false,
            bar: None,
            pending: Vec::new(),
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_batch_start(&mut self, count: usize, dry_run: bool) {
        self.in_preview = dry_run;
        if !self.enabled {
            return;
        }

        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!(
            "{} {} resource group{}...",
            if dry_run { "Checking" } else { "Applying" },
            count,
            if count == 1 { "" } else { "s" }
        ));
        bar.enable_steady_tick(Duration::from_millis(100));
        self.bar = Some(bar);
    }

    fn on_resource_start(&mut self, _id: &str, description: &str) {
        if let Some(bar) = &self.bar {
            bar.set_message(description.to_string());
        }
    }

    fn on_resource_complete(&mut self, _id: &str, result: &StateResult) {
        if self.in_preview && self.show_preview && result.is_pending() {
            self.pending.push(output::result_line(result));
        }
    }

    fn on_batch_complete(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }

        if self.enabled && !self.pending.is_empty() {
            ui::section("Pending changes");
            for line in self.pending.drain(..) {
                println!("  {line}");
            }
            println!();
        }
    }
}

// ============================================================================
// Confirmation
// ============================================================================

/// Ask on the terminal; refuse when there is no terminal to ask on
struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        if !std::io::stdin().is_terminal() {
            bail!("{prompt} Not running interactively; pass --yes to apply");
        }

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}
