//! # azurekit
//!
//! Pure Rust client for Azure Resource Manager resource groups.
//!
//! This crate provides functionality for:
//! - Parsing `connection_auth` settings (password or service principal)
//! - Checking, fetching, creating, tagging and deleting resource groups
//! - Swapping the REST backend for an in-memory one in tests
//!
//! ## Example
//!
//! ```no_run
//! use azurekit::{Client, ConnectionAuth, ResourceGroupSpec};
//! use serde_json::json;
//!
//! let settings = json!({
//!     "subscription_id": "bc75htn-a0fhsi-349b-56gh-4fghti-f84852",
//!     "tenant": "jhf3-fhsi-349b-56gh",
//!     "client_id": "a1b2c3",
//!     "secret": "XXXXXXXX",
//! });
//! let auth = ConnectionAuth::from_map(settings.as_object().unwrap()).unwrap();
//! let client = Client::connect(&auth).unwrap();
//!
//! if !client.exists("rg-web").unwrap() {
//!     let spec = ResourceGroupSpec::new("rg-web", "westus").with_tag("env", "prod");
//!     client.create_or_update(&spec).unwrap();
//! }
//! ```
//!
//! ## Testing
//!
//! [`backend::memory::MemoryBackend`] keeps groups in memory, counts calls
//! and can inject failures. It also implements [`Connector`], so code that
//! builds clients from credentials can be tested without network access.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod error;
pub mod types;

pub use backend::arm::{ArmConfig, ArmConnector};
pub use error::{Error, ErrorCategory, Result};
pub use types::{CloudEnvironment, ConnectionAuth, ResourceGroup, ResourceGroupSpec};

use backend::{Backend, arm::ArmBackend};

/// High-level client for resource group operations.
///
/// The client wraps a backend and logs each call at debug level.
pub struct Client {
    backend: Box<dyn Backend>,
}

impl Client {
    /// Create a client that talks to Resource Manager with default timeouts.
    ///
    /// No request is made until the first operation.
    pub fn connect(auth: &ConnectionAuth) -> Result<Self> {
        ArmConnector::default().connect(auth)
    }

    /// Create a client with a custom backend (useful for testing).
    pub fn with_backend(backend: Box<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Check if a resource group exists.
    pub fn exists(&self, name: &str) -> Result<bool> {
        log::debug!("checking existence of resource group {name}");
        self.backend.exists(name)
    }

    /// Fetch a resource group.
    pub fn get(&self, name: &str) -> Result<ResourceGroup> {
        log::debug!("fetching resource group {name}");
        self.backend.get(name)
    }

    /// Create a resource group or replace its tags.
    pub fn create_or_update(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroup> {
        log::debug!(
            "writing resource group {} in {} ({} tags)",
            spec.name,
            spec.location,
            spec.tags.len()
        );
        self.backend.create_or_update(spec)
    }

    /// Delete a resource group and wait for the deletion to finish.
    pub fn delete(&self, name: &str) -> Result<bool> {
        log::debug!("deleting resource group {name}");
        self.backend.delete(name)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

/// Builds clients from connection settings.
///
/// Reconcilers take a connector instead of a client so that settings are
/// validated before anything is connected.
pub trait Connector: Send + Sync {
    /// Create a client authenticated with `auth`.
    fn connect(&self, auth: &ConnectionAuth) -> Result<Client>;
}

impl From<ArmBackend> for Client {
    fn from(backend: ArmBackend) -> Self {
        Self::with_backend(Box::new(backend))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use backend::memory::{MEMORY_SUBSCRIPTION, MemoryBackend, Operation};

    #[test]
    fn test_client_delegates_to_backend() {
        let backend = MemoryBackend::new();
        let client = Client::with_backend(Box::new(backend.clone()));

        let spec = ResourceGroupSpec::new("rg1", "eastus").with_tag("team", "core");
        let created = client.create_or_update(&spec).unwrap();
        assert_eq!(
            created.id,
            format!("/subscriptions/{MEMORY_SUBSCRIPTION}/resourceGroups/rg1")
        );

        assert!(client.exists("rg1").unwrap());
        assert_eq!(client.get("rg1").unwrap().tags, spec.tags);
        assert!(client.delete("rg1").unwrap());
        assert!(!client.exists("rg1").unwrap());
    }

    #[test]
    fn test_client_surfaces_backend_errors() {
        let backend = MemoryBackend::new();
        backend.fail(Operation::Exists, "throttled");
        let client = Client::with_backend(Box::new(backend));

        let err = client.exists("rg1").unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Api);
    }
}
