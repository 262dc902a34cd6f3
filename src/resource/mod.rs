//! Resources managed by azstate
//!
//! Each resource reconciles one declaration from a state file against
//! Resource Manager through an injected [`azurekit::Connector`]:
//! - Query the live state
//! - Report what would change (dry run) or change it and verify
//! - Fold every failure into a [`declarative::StateResult`]

pub mod resource_group;

pub use resource_group::{ResourceGroupAbsent, ResourceGroupPresent};

/// Resource type of both resource group resources, used in targets
pub const RESOURCE_GROUP: &str = "resource_group";
