use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("azstate"))
}

/// Get the default auth profile file path
pub fn auth_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("auth.toml"))
}

/// Expand `~` and environment variables in a user-supplied path
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

// ============================================================================
// File Formats
// ============================================================================

/// On-disk format of a state or profile file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Detect the format from a file extension (TOML unless `.json`)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }

    /// Parse a document in this format
    pub fn parse<T: DeserializeOwned>(self, content: &str) -> Result<T> {
        match self {
            Self::Toml => toml::from_str(content).context("Invalid TOML format"),
            Self::Json => serde_json::from_str(content).context("Invalid JSON format"),
        }
    }
}

/// Read and parse a TOML or JSON file
pub fn load_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Could not read {}", path.display()))?;
    ConfigFormat::from_path(path)
        .parse(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

// ============================================================================
// Auth Profiles
// ============================================================================

/// Named `connection_auth` tables
///
/// The profile file holds one table per profile:
///
/// ```toml
/// [production]
/// subscription_id = "..."
/// tenant = "..."
/// client_id = "..."
/// secret = "..."
/// ```
///
/// Profiles declared in a state file's `[auth]` table take precedence over
/// profiles of the same name in the profile file.
#[derive(Debug, Default)]
pub struct AuthProfiles {
    profiles: BTreeMap<String, Value>,
    source: Option<PathBuf>,
}

impl AuthProfiles {
    /// Load profiles from `path`, or from the default profile file.
    ///
    /// An explicit path must exist; a missing default file yields no profiles.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (expand_path(p), true),
            None => (auth_file()?, false),
        };

        if !path.exists() {
            if explicit {
                bail!("Auth profile file not found: {}", path.display());
            }
            log::debug!("no auth profile file at {}", path.display());
            return Ok(Self::default());
        }

        let profiles: BTreeMap<String, Value> = load_file(&path)?;
        log::debug!("loaded {} auth profiles from {}", profiles.len(), path.display());

        Ok(Self {
            profiles,
            source: Some(path),
        })
    }

    /// Build profiles from an in-memory map
    pub fn from_map(profiles: BTreeMap<String, Value>) -> Self {
        Self {
            profiles,
            source: None,
        }
    }

    /// Layer profiles from a state file on top
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, Value>) -> Self {
        for (name, value) in overrides {
            if self.profiles.insert(name.clone(), value.clone()).is_some() {
                log::debug!("state file overrides auth profile '{name}'");
            }
        }
        self
    }

    /// Look up a profile by name.
    ///
    /// The value is returned as-is; it is validated when a resource applies.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.profiles.get(name) {
            return Ok(value.clone());
        }

        let known = if self.profiles.is_empty() {
            "none defined".to_string()
        } else {
            self.names().join(", ")
        };
        match &self.source {
            Some(path) => bail!(
                "Unknown auth profile '{}' (known: {}; profile file: {})",
                name,
                known,
                path.display()
            ),
            None => bail!("Unknown auth profile '{}' (known: {})", name, known),
        }
    }

    /// Profile names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}
