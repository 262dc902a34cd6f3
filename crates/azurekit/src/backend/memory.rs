//! In-memory backend for testing without network access.
//!
//! Clones share the same store, so a test can hand one clone to the code
//! under test (directly or through [`Connector`]) and inspect the other.
//!
//! ```
//! use azurekit::backend::Backend;
//! use azurekit::backend::memory::MemoryBackend;
//! use azurekit::ResourceGroupSpec;
//!
//! let backend = MemoryBackend::new().with_group(ResourceGroupSpec::new("rg1", "westus"));
//! assert!(backend.exists("rg1").unwrap());
//! assert_eq!(backend.calls().exists, 1);
//! ```

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::types::{ConnectionAuth, ResourceGroup, ResourceGroupSpec};
use crate::{Client, Connector};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Subscription id used for groups created by the memory backend.
pub const MEMORY_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Backend operations, used to inject failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`Backend::exists`]
    Exists,
    /// [`Backend::get`]
    Get,
    /// [`Backend::create_or_update`]
    CreateOrUpdate,
    /// [`Backend::delete`]
    Delete,
}

/// Number of calls made per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// Existence checks
    pub exists: usize,
    /// Fetches
    pub get: usize,
    /// Creates and updates
    pub create_or_update: usize,
    /// Deletes
    pub delete: usize,
}

impl CallCounts {
    /// Calls that could have changed remote state.
    pub fn mutating_calls(&self) -> usize {
        self.create_or_update + self.delete
    }

    /// All calls.
    pub fn total(&self) -> usize {
        self.exists + self.get + self.create_or_update + self.delete
    }
}

#[derive(Debug, Default)]
struct State {
    groups: BTreeMap<String, ResourceGroup>,
    calls: CallCounts,
    connections: usize,
    failures: HashMap<Operation, String>,
    ignore_writes: bool,
    provisioning_state: Option<String>,
    last_request: Option<ResourceGroupSpec>,
}

/// Resource group store held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`MemoryBackend::insert`].
    pub fn with_group(self, spec: ResourceGroupSpec) -> Self {
        self.insert(spec);
        self
    }

    /// Seed a resource group without counting a call.
    pub fn insert(&self, spec: ResourceGroupSpec) {
        let group = ResourceGroup::from_spec(MEMORY_SUBSCRIPTION, &spec);
        self.lock().groups.insert(spec.name, group);
    }

    /// Current copy of a stored group.
    pub fn group(&self, name: &str) -> Option<ResourceGroup> {
        self.lock().groups.get(name).cloned()
    }

    /// Calls made so far.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Number of times a client was connected through this backend.
    pub fn connections(&self) -> usize {
        self.lock().connections
    }

    /// Make every call of `operation` fail with an API error.
    pub fn fail(&self, operation: Operation, message: impl Into<String>) {
        self.lock().failures.insert(operation, message.into());
    }

    /// Accept writes without applying them.
    ///
    /// Deletes report success but leave the group in place; creates
    /// return the requested group without storing it.
    pub fn ignore_writes(&self, ignore: bool) {
        self.lock().ignore_writes = ignore;
    }

    /// Report `state` as the provisioning state of every group returned
    /// by `get` or `create_or_update`.
    pub fn set_provisioning_state(&self, state: impl Into<String>) {
        self.lock().provisioning_state = Some(state.into());
    }

    /// The last spec passed to `create_or_update`.
    pub fn last_request(&self) -> Option<ResourceGroupSpec> {
        self.lock().last_request.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl State {
    fn check(&self, operation: Operation) -> Result<()> {
        match self.failures.get(&operation) {
            Some(message) => Err(Error::Api {
                status: 500,
                code: "InjectedFailure".to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn reported(&self, mut group: ResourceGroup) -> ResourceGroup {
        if let Some(state) = &self.provisioning_state {
            group.provisioning_state = Some(state.clone());
        }
        group
    }
}

impl Backend for MemoryBackend {
    fn exists(&self, name: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.exists += 1;
        state.check(Operation::Exists)?;
        Ok(state.groups.contains_key(name))
    }

    fn get(&self, name: &str) -> Result<ResourceGroup> {
        let mut state = self.lock();
        state.calls.get += 1;
        state.check(Operation::Get)?;
        let group = state.groups.get(name).cloned().ok_or_else(|| Error::NotFound {
            name: name.to_string(),
        })?;
        Ok(state.reported(group))
    }

    fn create_or_update(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroup> {
        let mut state = self.lock();
        state.calls.create_or_update += 1;
        state.last_request = Some(spec.clone());
        state.check(Operation::CreateOrUpdate)?;

        let group = ResourceGroup::from_spec(MEMORY_SUBSCRIPTION, spec);
        if !state.ignore_writes {
            state.groups.insert(spec.name.clone(), group.clone());
        }
        Ok(state.reported(group))
    }

    fn delete(&self, name: &str) -> Result<bool> {
        let mut state = self.lock();
        state.calls.delete += 1;
        state.check(Operation::Delete)?;

        if state.ignore_writes {
            return Ok(state.groups.contains_key(name));
        }
        Ok(state.groups.remove(name).is_some())
    }
}

impl Connector for MemoryBackend {
    fn connect(&self, _auth: &ConnectionAuth) -> Result<Client> {
        self.lock().connections += 1;
        Ok(Client::with_backend(Box::new(self.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_then_delete() {
        let backend = MemoryBackend::new();
        let spec = ResourceGroupSpec::new("rg1", "westus").with_tag("env", "dev");

        let created = backend.create_or_update(&spec).unwrap();
        assert_eq!(created.provisioning_state.as_deref(), Some("Succeeded"));
        assert_eq!(backend.get("rg1").unwrap().tags, spec.tags);
        assert_eq!(backend.last_request(), Some(spec));

        assert!(backend.delete("rg1").unwrap());
        assert!(!backend.exists("rg1").unwrap());
        assert!(!backend.delete("rg1").unwrap());

        let calls = backend.calls();
        assert_eq!(calls.mutating_calls(), 3);
        assert_eq!(calls.total(), 5);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        assert!(matches!(backend.get("nope"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_injected_failure_still_counts() {
        let backend = MemoryBackend::new();
        backend.fail(Operation::CreateOrUpdate, "quota exceeded");

        let err = backend
            .create_or_update(&ResourceGroupSpec::new("rg1", "westus"))
            .unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(backend.calls().create_or_update, 1);
        assert!(backend.group("rg1").is_none());
    }

    #[test]
    fn test_ignore_writes() {
        let backend = MemoryBackend::new().with_group(ResourceGroupSpec::new("rg1", "westus"));
        backend.ignore_writes(true);

        assert!(backend.delete("rg1").unwrap());
        assert!(backend.exists("rg1").unwrap());
    }

    #[test]
    fn test_reported_provisioning_state() {
        let backend = MemoryBackend::new().with_group(ResourceGroupSpec::new("rg1", "westus"));
        backend.set_provisioning_state("Deleting");

        assert_eq!(backend.get("rg1").unwrap().provisioning_state.as_deref(), Some("Deleting"));
        let created = backend
            .create_or_update(&ResourceGroupSpec::new("rg2", "westus"))
            .unwrap();
        assert_eq!(created.provisioning_state.as_deref(), Some("Deleting"));
    }

    #[test]
    fn test_clones_share_state() {
        let backend = MemoryBackend::new();
        let auth = ConnectionAuth::UserPass {
            subscription_id: "sub".into(),
            username: "u".into(),
            password: "p".into(),
            cloud_environment: None,
        };

        let client = backend.connect(&auth).unwrap();
        client
            .create_or_update(&ResourceGroupSpec::new("rg1", "westus"))
            .unwrap();

        assert_eq!(backend.connections(), 1);
        assert!(backend.group("rg1").is_some());
    }
}
