//! # Declarative
//!
//! A framework for declarative resource management.
//!
//! This crate provides the core abstractions for declaring desired state,
//! reconciling live state towards it, and reporting what changed.
//!
//! ## Core Concepts
//!
//! - **Resource**: A declaration that can reconcile itself (`apply`)
//! - **ApplyContext**: Carries the dry-run flag into every apply
//! - **StateResult**: `{name, result, comment, changes}` where `result` is
//!   `true`, `false` or `null` for a pending dry-run change
//! - **deep_diff**: Recursive structural diff used for drift detection
//! - **ExecutionPlan** / **execute**: Preview, confirm, apply
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, ExecutionPlan, execute_simple};
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_resource(Box::new(my_resource))?;
//!
//! let report = execute_simple(plan, ExecuteOptions { dry_run: true, ..Default::default() })?;
//! for result in &report.results {
//!     println!("{}: {:?} {}", result.name, result.result(), result.comment);
//! }
//! ```
//!
//! ## Callback Traits
//!
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{TagDiff, deep_diff};
pub use executor::{ExecuteReport, execute, execute_simple};
pub use planner::ExecutionPlan;
pub use resource::{BoxedResource, Resource};
pub use types::{Changes, ExecuteOptions, ExecuteSummary, Outcome, StateResult};
