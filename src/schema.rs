use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ============================================================================
// State File Schema
// ============================================================================

/// A declarative state file
///
/// ```toml
/// [auth.mysubscription]
/// subscription_id = "..."
/// tenant = "..."
/// client_id = "..."
/// secret = "..."
///
/// [[resource_group]]
/// state = "present"
/// name = "my_rg"
/// location = "westus"
/// auth_profile = "mysubscription"
/// tags = { how_awesome = "very" }
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StateFile {
    /// Named `connection_auth` tables usable via `auth_profile`
    #[serde(default)]
    pub auth: BTreeMap<String, Value>,

    /// Resource group declarations, applied in order
    #[serde(default, rename = "resource_group")]
    pub resource_groups: Vec<ResourceGroupDecl>,
}

impl StateFile {
    /// Load a state file (TOML, or JSON when the extension is `.json`)
    pub fn load(path: &Path) -> Result<Self> {
        let state: Self = crate::config::load_file(path)?;
        state
            .validate()
            .with_context(|| format!("Invalid state file {}", path.display()))?;
        Ok(state)
    }

    /// Validate the declarations
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for decl in &self.resource_groups {
            decl.validate()
                .with_context(|| format!("Invalid resource_group '{}'", decl.name))?;
            if !seen.insert(decl.name.as_str()) {
                bail!("resource_group '{}' is declared more than once", decl.name);
            }
        }
        Ok(())
    }
}

/// Whether a resource group should exist
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    #[default]
    Present,
    Absent,
}

impl std::fmt::Display for DesiredState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DesiredState::Present => write!(f, "present"),
            DesiredState::Absent => write!(f, "absent"),
        }
    }
}

/// One `[[resource_group]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceGroupDecl {
    #[serde(default)]
    pub state: DesiredState,

    pub name: String,

    /// Required when present
    #[serde(default)]
    pub location: Option<String>,

    #[serde(default)]
    pub managed_by: Option<String>,

    /// Desired tags; omitted means no tags
    #[serde(default)]
    pub tags: Option<BTreeMap<String, String>>,

    /// Name of a profile in `[auth]` or the auth profile file
    #[serde(default)]
    pub auth_profile: Option<String>,

    /// Inline credentials, passed through unvalidated
    #[serde(default)]
    pub connection_auth: Option<Value>,
}

impl ResourceGroupDecl {
    /// Validate the declaration
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Resource group name cannot be empty");
        }

        match self.state {
            DesiredState::Present => {
                if self.location.as_deref().is_none_or(|l| l.trim().is_empty()) {
                    bail!("location is required when state = \"present\"");
                }
            }
            DesiredState::Absent => {
                if self.location.is_some() || self.managed_by.is_some() || self.tags.is_some() {
                    bail!("location, managed_by and tags only apply when state = \"present\"");
                }
            }
        }

        // Missing credentials are reported per resource when applied
        if self.auth_profile.is_some() && self.connection_auth.is_some() {
            bail!("Set either auth_profile or connection_auth, not both");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
