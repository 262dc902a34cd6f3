//! `azstate check` - validate a state file without contacting Azure

use anyhow::{Result, bail};
use azurekit::ConnectionAuth;
use serde_json::Value;

use crate::Context;
use crate::cli::CheckArgs;
use crate::config::{self, AuthProfiles};
use crate::schema::{DesiredState, ResourceGroupDecl, StateFile};
use crate::ui;

pub fn run(ctx: &Context, args: CheckArgs) -> Result<()> {
    let path = config::expand_path(&args.file);
    let state = StateFile::load(&path)?;
    let profiles = AuthProfiles::load(args.auth_file.as_deref())?.with_overrides(&state.auth);

    if !ctx.quiet {
        ui::header(&format!("Checking {}", path.display()));
    }

    let mut problems = 0;
    for decl in &state.resource_groups {
        let problem = check_auth(decl, &profiles).err();
        if ctx.quiet && problem.is_none() {
            continue;
        }

        match &problem {
            None => ui::success(&describe(decl)),
            Some(reason) => ui::error(&format!("{}: {reason}", describe(decl))),
        }
        if ctx.verbose > 0
            && let Some(tags) = &decl.tags
        {
            for (key, value) in tags {
                ui::kv(key, value);
            }
        }
        if problem.is_some() {
            problems += 1;
        }
    }

    if problems > 0 {
        bail!(
            "{} of {} declarations have unusable credentials",
            problems,
            state.resource_groups.len()
        );
    }

    if !ctx.quiet {
        println!();
        ui::info(&format!(
            "{} resource group declaration{} OK",
            state.resource_groups.len(),
            if state.resource_groups.len() == 1 { "" } else { "s" }
        ));
    }
    Ok(())
}

fn describe(decl: &ResourceGroupDecl) -> String {
    match decl.state {
        DesiredState::Present => format!(
            "{} present in {}",
            decl.name,
            decl.location.as_deref().unwrap_or("?")
        ),
        DesiredState::Absent => format!("{} absent", decl.name),
    }
}

/// Resolve and parse a declaration's credentials
fn check_auth(decl: &ResourceGroupDecl, profiles: &AuthProfiles) -> Result<(), String> {
    let value = match (&decl.auth_profile, &decl.connection_auth) {
        (Some(profile), _) => profiles.get(profile).map_err(|e| e.to_string())?,
        (None, Some(inline)) => inline.clone(),
        (None, None) => return Err("neither auth_profile nor connection_auth is set".to_string()),
    };

    match &value {
        Value::Object(settings) => ConnectionAuth::from_map(settings)
            .map(|_| ())
            .map_err(|e| e.to_string()),
        _ => Err("connection_auth must be a table".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn decl(auth_profile: Option<&str>, connection_auth: Option<Value>) -> ResourceGroupDecl {
        ResourceGroupDecl {
            state: DesiredState::Absent,
            name: "rg".to_string(),
            location: None,
            managed_by: None,
            tags: None,
            auth_profile: auth_profile.map(str::to_string),
            connection_auth,
        }
    }

    #[test]
    fn test_check_auth() {
        let profiles = AuthProfiles::from_map(BTreeMap::from([
            (
                "good".to_string(),
                json!({"subscription_id": "s", "tenant": "t", "client_id": "c", "secret": "x"}),
            ),
            ("partial".to_string(), json!({"subscription_id": "s", "tenant": "t"})),
        ]));

        assert!(check_auth(&decl(Some("good"), None), &profiles).is_ok());
        assert!(
            check_auth(&decl(Some("partial"), None), &profiles)
                .unwrap_err()
                .contains("client_id")
        );
        assert!(
            check_auth(&decl(Some("missing"), None), &profiles)
                .unwrap_err()
                .contains("Unknown auth profile")
        );
        assert!(check_auth(&decl(None, Some(json!("s"))), &profiles).is_err());
        assert!(check_auth(&decl(None, None), &profiles).is_err());
    }

    #[test]
    fn test_describe() {
        let mut present = decl(None, None);
        present.state = DesiredState::Present;
        present.location = Some("westus".to_string());
        assert_eq!(describe(&present), "rg present in westus");
        assert_eq!(describe(&decl(None, None)), "rg absent");
    }
}
