//! `azstate present` / `azstate absent` - reconcile a single resource group

use anyhow::{Context as _, Result, bail};
use azurekit::ResourceGroupSpec;
use declarative::{BoxedResource, ExecutionPlan};
use serde_json::Value;

use super::{arm_connector, finish, run_options};
use crate::Context;
use crate::cli::{AbsentArgs, AuthArgs, PresentArgs, RunArgs};
use crate::config::AuthProfiles;
use crate::engine;
use crate::resource::{ResourceGroupAbsent, ResourceGroupPresent};

pub fn present(ctx: &Context, args: PresentArgs) -> Result<()> {
    let connection_auth = resolve_auth(&args.auth)?;

    let mut spec = ResourceGroupSpec::new(args.name, args.location)
        .with_tags(args.tags.into_iter().collect());
    if let Some(managed_by) = args.managed_by {
        spec = spec.with_managed_by(managed_by);
    }

    let resource = ResourceGroupPresent::new(spec, connection_auth, arm_connector(&args.run));
    run_single(ctx, Box::new(resource), &args.run)
}

pub fn absent(ctx: &Context, args: AbsentArgs) -> Result<()> {
    let connection_auth = resolve_auth(&args.auth)?;
    let resource = ResourceGroupAbsent::new(args.name, connection_auth, arm_connector(&args.run));
    run_single(ctx, Box::new(resource), &args.run)
}

fn run_single(ctx: &Context, resource: BoxedResource, run: &RunArgs) -> Result<()> {
    let mut plan = ExecutionPlan::new();
    plan.add_resource(resource)?;

    let report = engine::run(plan, &run_options(ctx, run, 1))?;
    finish(&report, run)
}

/// The `connection_auth` value from a profile or the command line
fn resolve_auth(auth: &AuthArgs) -> Result<Option<Value>> {
    match (&auth.auth_profile, &auth.connection_auth) {
        (Some(profile), _) => AuthProfiles::load(auth.auth_file.as_deref())?
            .get(profile)
            .map(Some),
        (None, Some(inline)) => parse_inline_auth(inline).map(Some),
        (None, None) => bail!("One of --auth-profile or --connection-auth is required"),
    }
}

fn parse_inline_auth(inline: &str) -> Result<Value> {
    serde_json::from_str(inline).context("--connection-auth must be valid JSON")
}
