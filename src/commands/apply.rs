//! `azstate apply` - reconcile every declaration in a state file

use anyhow::Result;

use super::{arm_connector, finish, run_options};
use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::{self, AuthProfiles};
use crate::engine;
use crate::schema::StateFile;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let path = config::expand_path(&args.file);
    let state = StateFile::load(&path)?;
    let profiles = AuthProfiles::load(args.auth_file.as_deref())?.with_overrides(&state.auth);

    let connector = arm_connector(&args.run);
    let plan = engine::build_plan(&state, &profiles, &connector)?
        .filter_by_target(args.target.as_deref());

    if plan.is_empty() {
        if args.run.json {
            println!("[]");
        } else if !ctx.quiet {
            ui::info("Nothing to apply");
        }
        return Ok(());
    }

    let opts = run_options(ctx, &args.run, usize::from(args.jobs));
    let report = engine::run(plan, &opts)?;
    finish(&report, &args.run)
}
