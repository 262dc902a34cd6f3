//! Execution planner - turns declarations into resources

use anyhow::{Context, Result};
use azurekit::{Connector, ResourceGroupSpec};
use declarative::{BoxedResource, ExecutionPlan};
use serde_json::Value;
use std::sync::Arc;

use crate::config::AuthProfiles;
use crate::resource::{ResourceGroupAbsent, ResourceGroupPresent};
use crate::schema::{DesiredState, ResourceGroupDecl, StateFile};

/// Build a plan with one resource per declaration, in file order
pub fn build_plan(
    state: &StateFile,
    profiles: &AuthProfiles,
    connector: &Arc<dyn Connector>,
) -> Result<ExecutionPlan> {
    let mut plan = ExecutionPlan::new();
    for decl in &state.resource_groups {
        let resource = build_resource(decl, profiles, connector)
            .with_context(|| format!("Invalid resource_group '{}'", decl.name))?;
        plan.add_resource(resource)?;
    }
    Ok(plan)
}

/// Build the resource for a single declaration
pub fn build_resource(
    decl: &ResourceGroupDecl,
    profiles: &AuthProfiles,
    connector: &Arc<dyn Connector>,
) -> Result<BoxedResource> {
    let connection_auth = resolve_auth(decl, profiles)?;

    Ok(match decl.state {
        DesiredState::Present => {
            let mut spec =
                ResourceGroupSpec::new(&decl.name, decl.location.clone().unwrap_or_default())
                    .with_tags(decl.tags.clone().unwrap_or_default());
            if let Some(managed_by) = &decl.managed_by {
                spec = spec.with_managed_by(managed_by);
            }
            Box::new(ResourceGroupPresent::new(
                spec,
                connection_auth,
                Arc::clone(connector),
            ))
        }
        DesiredState::Absent => Box::new(ResourceGroupAbsent::new(
            &decl.name,
            connection_auth,
            Arc::clone(connector),
        )),
    })
}

/// The `connection_auth` value a declaration uses, unvalidated
fn resolve_auth(decl: &ResourceGroupDecl, profiles: &AuthProfiles) -> Result<Option<Value>> {
    match (&decl.auth_profile, &decl.connection_auth) {
        (Some(profile), _) => profiles.get(profile).map(Some),
        (None, inline) => Ok(inline.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use azurekit::backend::memory::MemoryBackend;
    use declarative::{ExecuteOptions, Resource, execute_simple};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn state(toml: &str) -> StateFile {
        let state: StateFile = toml::from_str(toml).unwrap();
        state.validate().unwrap();
        state
    }

    fn profiles() -> AuthProfiles {
        AuthProfiles::from_map(BTreeMap::from([(
            "prod".to_string(),
            json!({"subscription_id": "sub", "username": "u", "password": "p"}),
        )]))
    }

    #[test]
    fn test_build_plan_in_file_order() {
        let backend = MemoryBackend::new();
        let connector: Arc<dyn Connector> = Arc::new(backend);
        let state = state(
            r#"
[[resource_group]]
name = "rg-b"
location = "westus"
auth_profile = "prod"
tags = { env = "prod" }

[[resource_group]]
state = "absent"
name = "rg-a"
auth_profile = "prod"
"#,
        );

        let plan = build_plan(&state, &profiles(), &connector).unwrap();
        let ids: Vec<String> = plan.resources.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["rg-b", "rg-a"]);
        assert!(plan.resources.iter().all(|r| r.resource_type() == "resource_group"));
    }

    #[test]
    fn test_unknown_profile_fails_planning() {
        let connector: Arc<dyn Connector> = Arc::new(MemoryBackend::new());
        let state = state(
            r#"
[[resource_group]]
state = "absent"
name = "rg"
auth_profile = "staging"
"#,
        );

        let err = format!("{:#}", build_plan(&state, &profiles(), &connector).unwrap_err());
        assert!(err.contains("Invalid resource_group 'rg'"));
        assert!(err.contains("Unknown auth profile 'staging'"));
    }

    #[test]
    fn test_plan_applies_against_backend() {
        let backend = MemoryBackend::new();
        let connector: Arc<dyn Connector> = Arc::new(backend.clone());
        let state = state(
            r#"
[[resource_group]]
name = "my_rg"
location = "westus"
managed_by = "/subscriptions/sub/providers/Microsoft.Solutions/applications/app"
auth_profile = "prod"
tags = { how_awesome = "very" }
"#,
        );

        let plan = build_plan(&state, &profiles(), &connector).unwrap();
        let report = execute_simple(plan, ExecuteOptions::default()).unwrap();

        assert_eq!(report.summary.changed, 1);
        let created = backend.group("my_rg").unwrap();
        assert_eq!(created.location, "westus");
        assert!(created.managed_by.unwrap().ends_with("applications/app"));
        assert_eq!(created.tags["how_awesome"], "very");
    }

    #[test]
    fn test_missing_auth_fails_only_that_resource() {
        let backend = MemoryBackend::new();
        let connector: Arc<dyn Connector> = Arc::new(backend.clone());
        let state = state(
            r#"
[[resource_group]]
name = "rg-ok"
location = "westus"
auth_profile = "prod"

[[resource_group]]
state = "absent"
name = "rg-noauth"
"#,
        );

        let plan = build_plan(&state, &profiles(), &connector).unwrap();
        let report = execute_simple(plan, ExecuteOptions::default()).unwrap();

        assert_eq!(report.summary.changed, 1);
        assert_eq!(report.summary.failed, 1);
        assert_eq!(report.results[1].name, "rg-noauth");
        assert_eq!(report.results[1].result(), Some(false));
        assert_eq!(
            report.results[1].comment,
            "Connection information must be specified via connection_auth dictionary!"
        );
        assert!(backend.group("rg-ok").is_some());
    }

    #[test]
    fn test_inline_non_table_auth_reaches_resource() {
        let backend = MemoryBackend::new();
        let connector: Arc<dyn Connector> = Arc::new(backend.clone());
        let state = state(
            r#"
[[resource_group]]
state = "absent"
name = "rg"
connection_auth = "sub-only"
"#,
        );

        let plan = build_plan(&state, &profiles(), &connector).unwrap();
        let report = execute_simple(plan, ExecuteOptions::default()).unwrap();

        assert_eq!(report.summary.failed, 1);
        assert_eq!(
            report.results[0].comment,
            "Connection information must be specified via connection_auth dictionary!"
        );
        assert_eq!(backend.calls().total(), 0);
    }
}
