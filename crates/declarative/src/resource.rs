//! Resource trait for declarative state management
//!
//! A Resource is a declaration of desired state that knows how to
//! reconcile the live system towards it.

use crate::context::ApplyContext;
use crate::types::StateResult;
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, Changes, Resource, StateResult};
///
/// #[derive(Debug)]
/// struct FileResource {
///     path: String,
///     content: String,
/// }
///
/// impl Resource for FileResource {
///     fn id(&self) -> String {
///         self.path.clone()
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure file exists at {}", self.path)
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "file"
///     }
///
///     fn apply(&self, ctx: &ApplyContext) -> anyhow::Result<StateResult> {
///         if std::path::Path::new(&self.path).exists() {
///             return Ok(StateResult::success(&self.path, "File is already present."));
///         }
///         if ctx.dry_run {
///             return Ok(StateResult::pending(&self.path, "File would be created.", Changes::none()));
///         }
///         std::fs::write(&self.path, &self.content)?;
///         Ok(StateResult::success(&self.path, "File has been created."))
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Unique identifier for this resource
    ///
    /// Stable and unique within its type, e.g. the resource group name.
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping and target filtering
    fn resource_type(&self) -> &'static str;

    /// Reconcile the live state towards the desired state
    ///
    /// Implementations must not issue mutating calls when `ctx.dry_run`
    /// is set. Expected failures are reported as a failure
    /// [`StateResult`]; an `Err` is treated the same way by the executor.
    fn apply(&self, ctx: &ApplyContext) -> Result<StateResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
