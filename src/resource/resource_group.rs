//! Resource group resources - ensure a group is present (with tags) or absent

use anyhow::Result;
use azurekit::{Client, ConnectionAuth, Connector, ResourceGroup, ResourceGroupSpec};
use declarative::{ApplyContext, Changes, Resource, StateResult, TagDiff, deep_diff};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;

use super::RESOURCE_GROUP;

/// Remote operation a failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Query,
    Create,
    Update,
    Delete,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Query => write!(f, "query"),
            Action::Create => write!(f, "create"),
            Action::Update => write!(f, "update"),
            Action::Delete => write!(f, "delete"),
        }
    }
}

/// Why a reconciliation failed. The `Display` text is the result comment.
#[derive(Debug, thiserror::Error)]
enum ReconcileError {
    #[error("Connection information must be specified via connection_auth dictionary!")]
    MissingConnectionAuth,

    #[error("Connection information is incomplete: {0}")]
    IncompleteConnectionAuth(String),

    #[error("Failed to {action} resource group {name}! ({source})")]
    Client {
        action: Action,
        name: String,
        source: azurekit::Error,
    },

    /// The mutating call succeeded but the follow-up check disagrees
    #[error("Failed to {action} resource group {name}!{}", state_suffix(.provisioning_state))]
    VerificationMismatch {
        action: Action,
        name: String,
        provisioning_state: Option<String>,
    },
}

/// ` (provisioning state: X)` unless the state is missing or `Succeeded`
fn state_suffix(provisioning_state: &Option<String>) -> String {
    match provisioning_state.as_deref() {
        None | Some("Succeeded") => String::new(),
        Some(state) => format!(" (provisioning state: {state})"),
    }
}

impl ReconcileError {
    fn client(action: Action, name: &str) -> impl FnOnce(azurekit::Error) -> Self + '_ {
        move |source| ReconcileError::Client {
            action,
            name: name.to_string(),
            source,
        }
    }
}

/// Validate `connection_auth` and connect. Makes no remote call.
fn connect(
    connection_auth: Option<&Value>,
    connector: &dyn Connector,
    name: &str,
) -> Result<Client, ReconcileError> {
    let Some(Value::Object(settings)) = connection_auth else {
        return Err(ReconcileError::MissingConnectionAuth);
    };

    let auth = ConnectionAuth::from_map(settings).map_err(|e| match e {
        azurekit::Error::InvalidAuth { message } => ReconcileError::IncompleteConnectionAuth(message),
        other => ReconcileError::IncompleteConnectionAuth(other.to_string()),
    })?;

    log::debug!(
        "connecting to subscription {} ({}, {})",
        auth.subscription_id(),
        auth.kind(),
        auth.cloud_environment()
    );
    connector
        .connect(&auth)
        .map_err(ReconcileError::client(Action::Query, name))
}

fn record_value(group: &ResourceGroup) -> Value {
    serde_json::to_value(group).unwrap_or(Value::Null)
}

/// Run a reconciliation, folding its error into a failure result
fn finish(name: &str, outcome: Result<StateResult, ReconcileError>) -> StateResult {
    outcome.unwrap_or_else(|e| {
        log::info!("{name}: {e}");
        StateResult::failure(name, e.to_string())
    })
}

/// Redacted view of a `connection_auth` value for `Debug` output
fn auth_shape(connection_auth: Option<&Value>) -> &'static str {
    match connection_auth {
        None => "none",
        Some(Value::Object(_)) => "<redacted>",
        Some(_) => "<not a table>",
    }
}

// ============================================================================
// Present
// ============================================================================

/// Ensure a resource group exists and carries exactly the desired tags.
///
/// Location and `managed_by` are only used when the group is created; they
/// are never compared against the live group.
pub struct ResourceGroupPresent {
    pub spec: ResourceGroupSpec,
    /// Raw `connection_auth` value, validated on apply
    pub connection_auth: Option<Value>,
    connector: Arc<dyn Connector>,
}

impl ResourceGroupPresent {
    pub fn new(
        spec: ResourceGroupSpec,
        connection_auth: Option<Value>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            spec,
            connection_auth,
            connector,
        }
    }

    /// Request that changes only the tags of an existing group
    fn tags_update(&self, current: &ResourceGroup) -> ResourceGroupSpec {
        if current.location != self.spec.location {
            log::debug!(
                "resource group {} stays in {} (declared {})",
                current.name,
                current.location,
                self.spec.location
            );
        }
        ResourceGroupSpec {
            name: self.spec.name.clone(),
            location: current.location.clone(),
            managed_by: current.managed_by.clone(),
            tags: self.spec.tags.clone(),
        }
    }

    fn reconcile(&self, ctx: &ApplyContext) -> Result<StateResult, ReconcileError> {
        let name = self.spec.name.as_str();
        let client = connect(self.connection_auth.as_ref(), self.connector.as_ref(), name)?;

        let present = client
            .exists(name)
            .map_err(ReconcileError::client(Action::Query, name))?;

        let previous = if present {
            let current = client
                .get(name)
                .map_err(ReconcileError::client(Action::Query, name))?;
            let live = json!(current.tags);
            let desired = json!(self.spec.tags);

            if deep_diff(&live, &desired).is_empty() {
                return Ok(StateResult::success(
                    name,
                    format!("Resource group {name} is already present."),
                ));
            }

            log::info!(
                "resource group {name} tag drift: {}",
                TagDiff::between(&current.tags, &self.spec.tags)
            );

            if ctx.dry_run {
                return Ok(StateResult::pending(
                    name,
                    format!("Resource group {name} tags would be updated."),
                    Changes::new(live, desired),
                ));
            }
            Some(current)
        } else {
            if ctx.dry_run {
                return Ok(StateResult::pending(
                    name,
                    format!("Resource group {name} would be created."),
                    Changes::new(
                        json!({}),
                        json!({
                            "name": name,
                            "location": self.spec.location,
                            "managed_by": self.spec.managed_by,
                            "tags": self.spec.tags,
                        }),
                    ),
                ));
            }
            None
        };

        let action = if previous.is_some() {
            Action::Update
        } else {
            Action::Create
        };

        let request = match &previous {
            Some(current) => self.tags_update(current),
            None => self.spec.clone(),
        };
        let group = client
            .create_or_update(&request)
            .map_err(ReconcileError::client(action, name))?;

        let confirmed = client
            .exists(name)
            .map_err(ReconcileError::client(action, name))?;
        if !confirmed {
            return Err(ReconcileError::VerificationMismatch {
                action,
                name: name.to_string(),
                provisioning_state: group.provisioning_state,
            });
        }

        Ok(match previous {
            Some(current) => StateResult::success(
                name,
                format!("Resource group {name} has been updated."),
            )
            .with_changes(Changes::new(json!(current.tags), json!(group.tags))),
            None => StateResult::success(name, format!("Resource group {name} has been created."))
                .with_changes(Changes::new(json!({}), record_value(&group))),
        })
    }
}

impl fmt::Debug for ResourceGroupPresent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGroupPresent")
            .field("spec", &self.spec)
            .field(
                "connection_auth",
                &auth_shape(self.connection_auth.as_ref()),
            )
            .finish_non_exhaustive()
    }
}

impl Resource for ResourceGroupPresent {
    fn id(&self) -> String {
        self.spec.name.clone()
    }

    fn description(&self) -> String {
        format!(
            "Resource group {} present in {}",
            self.spec.name, self.spec.location
        )
    }

    fn resource_type(&self) -> &'static str {
        RESOURCE_GROUP
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<StateResult> {
        Ok(finish(&self.spec.name, self.reconcile(ctx)))
    }
}

// ============================================================================
// Absent
// ============================================================================

/// Ensure no resource group of the given name exists.
pub struct ResourceGroupAbsent {
    pub name: String,
    /// Raw `connection_auth` value, validated on apply
    pub connection_auth: Option<Value>,
    connector: Arc<dyn Connector>,
}

impl ResourceGroupAbsent {
    pub fn new(
        name: impl Into<String>,
        connection_auth: Option<Value>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            name: name.into(),
            connection_auth,
            connector,
        }
    }

    fn reconcile(&self, ctx: &ApplyContext) -> Result<StateResult, ReconcileError> {
        let name = self.name.as_str();
        let client = connect(self.connection_auth.as_ref(), self.connector.as_ref(), name)?;

        let present = client
            .exists(name)
            .map_err(ReconcileError::client(Action::Query, name))?;
        if !present {
            return Ok(StateResult::success(
                name,
                format!("Resource group {name} is already absent."),
            ));
        }

        let group = client
            .get(name)
            .map_err(ReconcileError::client(Action::Query, name))?;
        let changes = Changes::new(record_value(&group), json!({}));

        if ctx.dry_run {
            return Ok(StateResult::pending(
                name,
                format!("Resource group {name} would be deleted."),
                changes,
            ));
        }

        let deleted = client
            .delete(name)
            .map_err(ReconcileError::client(Action::Delete, name))?;
        if !deleted {
            log::debug!("delete of {name} reported nothing removed");
        }

        let still_present = client
            .exists(name)
            .map_err(ReconcileError::client(Action::Delete, name))?;
        if still_present {
            return Err(ReconcileError::VerificationMismatch {
                action: Action::Delete,
                name: name.to_string(),
                provisioning_state: client.get(name).ok().and_then(|g| g.provisioning_state),
            });
        }

        Ok(StateResult::success(name, format!("Resource group {name} has been deleted."))
            .with_changes(changes))
    }
}

impl fmt::Debug for ResourceGroupAbsent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceGroupAbsent")
            .field("name", &self.name)
            .field(
                "connection_auth",
                &auth_shape(self.connection_auth.as_ref()),
            )
            .finish_non_exhaustive()
    }
}

impl Resource for ResourceGroupAbsent {
    fn id(&self) -> String {
        self.name.clone()
    }

    fn description(&self) -> String {
        format!("Resource group {} absent", self.name)
    }

    fn resource_type(&self) -> &'static str {
        RESOURCE_GROUP
    }

    fn apply(&self, ctx: &ApplyContext) -> Result<StateResult> {
        Ok(finish(&self.name, self.reconcile(ctx)))
    }
}
