//! Command implementations

pub mod apply;
pub mod check;
pub mod resource_group;

use anyhow::{Result, bail};
use azurekit::{ArmConfig, ArmConnector, Connector};
use declarative::ExecuteReport;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::engine::{self, RunOptions};
use crate::Context;

/// Connector for the real Resource Manager API
fn arm_connector(run: &RunArgs) -> Arc<dyn Connector> {
    Arc::new(ArmConnector::new(ArmConfig {
        timeout: Duration::from_secs(run.timeout),
        operation_timeout: Duration::from_secs(run.operation_timeout),
        ..ArmConfig::default()
    }))
}

fn run_options(ctx: &Context, run: &RunArgs, jobs: usize) -> RunOptions {
    RunOptions {
        dry_run: run.dry_run,
        jobs,
        yes: run.yes,
        quiet: run.json || ctx.quiet,
        verbose: ctx.verbose > 0,
    }
}

/// Print the report and turn failures into a non-zero exit
fn finish(report: &ExecuteReport, run: &RunArgs) -> Result<()> {
    engine::output::print_report(report, run.json, run.dry_run)?;

    if !report.summary.is_success() {
        bail!(
            "{} of {} resource group{} failed",
            report.summary.failed,
            report.summary.total(),
            if report.summary.total() == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
