//! Execution engine - previews, confirms, then applies a plan

use crate::context::{ApplyContext, ConfirmCallback, ProgressCallback};
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::types::{ExecuteOptions, ExecuteSummary, StateResult};
use anyhow::Result;
use rayon::prelude::*;
use serde::Serialize;

/// Outcome of executing a plan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecuteReport {
    /// One result per resource, in plan order
    pub results: Vec<StateResult>,
    pub summary: ExecuteSummary,
    /// Pending changes existed but the user declined to apply them
    #[serde(skip)]
    pub declined: bool,
}

impl ExecuteReport {
    fn from_results(results: Vec<StateResult>) -> Self {
        let summary = ExecuteSummary::from_results(&results);
        Self {
            results,
            summary,
            declined: false,
        }
    }
}

/// Execute a plan with the given options and callbacks
///
/// Every resource is first applied in dry-run mode. With `opts.dry_run`,
/// or when nothing is pending, that preview is the report. Otherwise the
/// confirm callback is asked once and only the resources with pending
/// changes are applied for real; the rest keep their preview result.
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if plan.is_empty() {
        return Ok(ExecuteReport::default());
    }

    let preview_ctx = ApplyContext::new(true, opts.verbose);
    let mut results = execute_batch(&plan.resources, opts.jobs, preview_ctx, progress)?;

    let pending: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_pending())
        .map(|(i, _)| i)
        .collect();

    if opts.dry_run || pending.is_empty() {
        return Ok(ExecuteReport::from_results(results));
    }

    let prompt = format!(
        "Apply {} pending change{}?",
        pending.len(),
        if pending.len() == 1 { "" } else { "s" }
    );
    if !confirm.confirm(&prompt)? {
        log::info!("declined to apply {} pending changes", pending.len());
        let mut report = ExecuteReport::from_results(results);
        report.declined = true;
        return Ok(report);
    }

    let to_apply: Vec<&dyn Resource> = pending
        .iter()
        .map(|&i| plan.resources[i].as_ref())
        .collect();
    let live_ctx = ApplyContext::new(false, opts.verbose);
    let applied = execute_refs(&to_apply, opts.jobs, live_ctx, progress)?;

    for (index, result) in pending.into_iter().zip(applied) {
        results[index] = result;
    }

    Ok(ExecuteReport::from_results(results))
}

/// Execute a batch of resources
fn execute_batch<P: ProgressCallback>(
    resources: &[Box<dyn Resource>],
    jobs: usize,
    ctx: ApplyContext,
    progress: &mut P,
) -> Result<Vec<StateResult>> {
    let refs: Vec<&dyn Resource> = resources.iter().map(|r| r.as_ref()).collect();
    execute_refs(&refs, jobs, ctx, progress)
}

fn execute_refs<P: ProgressCallback>(
    resources: &[&dyn Resource],
    jobs: usize,
    ctx: ApplyContext,
    progress: &mut P,
) -> Result<Vec<StateResult>> {
    progress.on_batch_start(resources.len(), ctx.dry_run);

    let results = if jobs <= 1 || resources.len() == 1 {
        let mut results = Vec::with_capacity(resources.len());
        for resource in resources {
            progress.on_resource_start(&resource.id(), &resource.description());
            let result = apply_resource(*resource, &ctx);
            progress.on_resource_complete(&resource.id(), &result);
            results.push(result);
        }
        results
    } else {
        execute_parallel(resources, jobs, ctx, progress)?
    };

    progress.on_batch_complete();
    Ok(results)
}

/// Execute resources in parallel using rayon
///
/// The progress callback is not thread-safe, so completions are reported
/// after the pool finishes. Result order matches input order.
fn execute_parallel<P: ProgressCallback>(
    resources: &[&dyn Resource],
    jobs: usize,
    ctx: ApplyContext,
    progress: &mut P,
) -> Result<Vec<StateResult>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {}", e))?;

    let results: Vec<StateResult> = pool.install(|| {
        resources
            .par_iter()
            .map(|resource| apply_resource(*resource, &ctx))
            .collect()
    });

    for (resource, result) in resources.iter().zip(&results) {
        progress.on_resource_complete(&resource.id(), result);
    }

    Ok(results)
}

/// Apply a single resource, folding errors into a failure result
fn apply_resource(resource: &dyn Resource, ctx: &ApplyContext) -> StateResult {
    match resource.apply(ctx) {
        Ok(result) => result,
        Err(e) => {
            log::warn!("{} failed: {:#}", resource.id(), e);
            StateResult::failure(resource.id(), format!("{e:#}"))
        }
    }
}

/// Simple execution without callbacks
///
/// Applies without asking for confirmation.
pub fn execute_simple(plan: ExecutionPlan, opts: ExecuteOptions) -> Result<ExecuteReport> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use crate::types::{Changes, Outcome};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct TestResource {
        id: String,
        should_change: bool,
        fail: bool,
        live_applies: AtomicUsize,
    }

    impl TestResource {
        fn new(id: &str, should_change: bool) -> Self {
            Self {
                id: id.into(),
                should_change,
                fail: false,
                live_applies: AtomicUsize::new(0),
            }
        }
    }

    impl Resource for TestResource {
        fn id(&self) -> String {
            self.id.clone()
        }

        fn description(&self) -> String {
            format!("Test resource {}", self.id)
        }

        fn resource_type(&self) -> &'static str {
            "test"
        }

        fn apply(&self, ctx: &ApplyContext) -> Result<StateResult> {
            if self.fail {
                anyhow::bail!("backend unavailable");
            }
            if !self.should_change {
                return Ok(StateResult::success(&self.id, "already present"));
            }
            let changes = Changes::new(json!({}), json!({"name": self.id}));
            if ctx.dry_run {
                return Ok(StateResult::pending(&self.id, "would be created", changes));
            }
            self.live_applies.fetch_add(1, Ordering::SeqCst);
            Ok(StateResult::success(&self.id, "created").with_changes(changes))
        }
    }

    fn plan_of(resources: Vec<TestResource>) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for resource in resources {
            plan.add_resource(Box::new(resource)).unwrap();
        }
        plan
    }

    #[test]
    fn test_execute_empty_plan() {
        let report = execute(
            ExecutionPlan::new(),
            ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(report.summary.total(), 0);
    }

    #[test]
    fn test_execute_no_changes() {
        let report = execute_simple(
            plan_of(vec![TestResource::new("test1", false)]),
            ExecuteOptions::default(),
        )
        .unwrap();

        assert_eq!(report.summary.unchanged, 1);
        assert_eq!(report.summary.total_changes(), 0);
    }

    #[test]
    fn test_execute_with_changes() {
        let report = execute_simple(
            plan_of(vec![
                TestResource::new("test1", true),
                TestResource::new("test2", false),
            ]),
            ExecuteOptions::default(),
        )
        .unwrap();

        assert_eq!(report.summary.changed, 1);
        assert_eq!(report.summary.unchanged, 1);
        assert_eq!(report.results[0].outcome, Outcome::Success);
        assert_eq!(report.results[0].comment, "created");
    }

    #[test]
    fn test_dry_run_reports_pending() {
        let report = execute_simple(
            plan_of(vec![TestResource::new("test1", true)]),
            ExecuteOptions {
                dry_run: true,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(report.summary.pending, 1);
        assert_eq!(report.results[0].result(), None);
    }

    #[test]
    fn test_declined_keeps_preview() {
        let report = execute(
            plan_of(vec![TestResource::new("test1", true)]),
            ExecuteOptions::default(),
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert!(report.declined);
        assert_eq!(report.summary.pending, 1);
        assert_eq!(report.summary.changed, 0);
    }

    #[test]
    fn test_error_becomes_failure() {
        let mut failing = TestResource::new("broken", true);
        failing.fail = true;
        let report =
            execute_simple(plan_of(vec![failing]), ExecuteOptions::default()).unwrap();

        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.results[0].comment, "backend unavailable");
        assert!(!report.summary.is_success());
    }

    #[test]
    fn test_parallel_preserves_order() {
        let resources: Vec<TestResource> = (0..8)
            .map(|i| TestResource::new(&format!("r{i}"), i % 2 == 0))
            .collect();
        let report = execute_simple(
            plan_of(resources),
            ExecuteOptions {
                jobs: 4,
                ..Default::default()
            },
        )
        .unwrap();

        let names: Vec<&str> = report.results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["r0", "r1", "r2", "r3", "r4", "r5", "r6", "r7"]);
        assert_eq!(report.summary.changed, 4);
        assert_eq!(report.summary.unchanged, 4);
    }
}
