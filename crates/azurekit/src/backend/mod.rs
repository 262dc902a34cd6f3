//! Backend abstraction for resource group operations.
//!
//! The [`Backend`] trait defines the interface for talking to Resource
//! Manager, allowing for different implementations (real REST API,
//! in-memory store for tests).

pub mod arm;
pub mod memory;

use crate::error::Result;
use crate::types::{ResourceGroup, ResourceGroupSpec};

/// Backend trait for resource group operations.
///
/// Every call is a single blocking request sequence with no retries.
pub trait Backend: Send + Sync {
    /// Check if a resource group exists.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Fetch a resource group.
    fn get(&self, name: &str) -> Result<ResourceGroup>;

    /// Create a resource group, or replace the tags of an existing one.
    fn create_or_update(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroup>;

    /// Delete a resource group.
    ///
    /// Returns `false` if the backend reports nothing was deleted.
    fn delete(&self, name: &str) -> Result<bool>;
}
