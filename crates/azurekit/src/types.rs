//! Core types for resource group management.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Azure cloud an account lives in.
///
/// Each cloud has its own Resource Manager and Active Directory endpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CloudEnvironment {
    /// Global Azure
    #[default]
    #[serde(rename = "AZURE_PUBLIC_CLOUD")]
    Public,
    /// Azure operated by 21Vianet
    #[serde(rename = "AZURE_CHINA_CLOUD")]
    China,
    /// Azure Government
    #[serde(rename = "AZURE_US_GOV_CLOUD")]
    UsGov,
    /// Azure Germany
    #[serde(rename = "AZURE_GERMAN_CLOUD")]
    German,
}

impl CloudEnvironment {
    /// Identifier used in connection settings.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Public => "AZURE_PUBLIC_CLOUD",
            Self::China => "AZURE_CHINA_CLOUD",
            Self::UsGov => "AZURE_US_GOV_CLOUD",
            Self::German => "AZURE_GERMAN_CLOUD",
        }
    }

    /// Parse an identifier (case-insensitive, short names accepted).
    pub fn from_identifier(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "AZURE_PUBLIC_CLOUD" | "PUBLIC" => Some(Self::Public),
            "AZURE_CHINA_CLOUD" | "CHINA" => Some(Self::China),
            "AZURE_US_GOV_CLOUD" | "USGOV" | "US_GOV" => Some(Self::UsGov),
            "AZURE_GERMAN_CLOUD" | "GERMAN" => Some(Self::German),
            _ => None,
        }
    }

    /// Resource Manager endpoint, without trailing slash.
    pub fn resource_manager_endpoint(&self) -> &'static str {
        match self {
            Self::Public => "https://management.azure.com",
            Self::China => "https://management.chinacloudapi.cn",
            Self::UsGov => "https://management.usgovcloudapi.net",
            Self::German => "https://management.microsoftazure.de",
        }
    }

    /// Active Directory authority, without trailing slash.
    pub fn active_directory_endpoint(&self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com",
            Self::China => "https://login.chinacloudapi.cn",
            Self::UsGov => "https://login.microsoftonline.us",
            Self::German => "https://login.microsoftonline.de",
        }
    }

    /// Resource identifier tokens are requested for.
    pub fn token_audience(&self) -> &'static str {
        match self {
            Self::Public => "https://management.core.windows.net/",
            Self::China => "https://management.core.chinacloudapi.cn/",
            Self::UsGov => "https://management.core.usgovcloudapi.net/",
            Self::German => "https://management.core.cloudapi.de/",
        }
    }
}

impl fmt::Display for CloudEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

/// Credentials for connecting to Resource Manager.
///
/// Built from a `connection_auth` table with [`ConnectionAuth::from_map`].
/// Secrets are redacted from `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub enum ConnectionAuth {
    /// Organizational account (no MFA) signing in with a password
    UserPass {
        /// Subscription holding the resource groups
        subscription_id: String,
        /// Account name, e.g. `fletch@contoso.com`
        username: String,
        /// Account password
        password: String,
        /// Cloud to sign in to (public when unset)
        cloud_environment: Option<CloudEnvironment>,
    },
    /// Application registration signing in with a client secret
    ServicePrincipal {
        /// Subscription holding the resource groups
        subscription_id: String,
        /// Directory (tenant) id
        tenant: String,
        /// Application (client) id
        client_id: String,
        /// Client secret
        secret: String,
        /// Cloud to sign in to (public when unset)
        cloud_environment: Option<CloudEnvironment>,
    },
}

const SERVICE_PRINCIPAL_KEYS: [&str; 3] = ["tenant", "client_id", "secret"];
const USER_PASS_KEYS: [&str; 2] = ["username", "password"];

impl ConnectionAuth {
    /// Parse a `connection_auth` table.
    ///
    /// Any of `tenant`/`client_id`/`secret` selects a service principal and
    /// then all three are required; otherwise `username` and `password` are.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        let subscription_id = required(map, "subscription_id")?;
        let cloud_environment = match map.get("cloud_environment") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(CloudEnvironment::from_identifier(s).ok_or_else(
                || Error::invalid_auth(format!("unknown cloud_environment '{s}'")),
            )?),
            Some(_) => return Err(Error::invalid_auth("cloud_environment must be a string")),
        };

        if SERVICE_PRINCIPAL_KEYS.iter().any(|k| map.contains_key(*k)) {
            let missing = missing_keys(map, &SERVICE_PRINCIPAL_KEYS);
            if !missing.is_empty() {
                return Err(Error::invalid_auth(format!(
                    "service principal requires {}",
                    missing.join(", ")
                )));
            }
            return Ok(Self::ServicePrincipal {
                subscription_id,
                tenant: required(map, "tenant")?,
                client_id: required(map, "client_id")?,
                secret: required(map, "secret")?,
                cloud_environment,
            });
        }

        if USER_PASS_KEYS.iter().any(|k| map.contains_key(*k)) {
            let missing = missing_keys(map, &USER_PASS_KEYS);
            if !missing.is_empty() {
                return Err(Error::invalid_auth(format!(
                    "username/password authentication requires {}",
                    missing.join(", ")
                )));
            }
            return Ok(Self::UserPass {
                subscription_id,
                username: required(map, "username")?,
                password: required(map, "password")?,
                cloud_environment,
            });
        }

        Err(Error::invalid_auth(
            "expected username/password or tenant/client_id/secret",
        ))
    }

    /// Subscription the credentials operate on.
    pub fn subscription_id(&self) -> &str {
        match self {
            Self::UserPass {
                subscription_id, ..
            }
            | Self::ServicePrincipal {
                subscription_id, ..
            } => subscription_id,
        }
    }

    /// Cloud environment, defaulting to the public cloud.
    pub fn cloud_environment(&self) -> CloudEnvironment {
        match self {
            Self::UserPass {
                cloud_environment, ..
            }
            | Self::ServicePrincipal {
                cloud_environment, ..
            } => cloud_environment.unwrap_or_default(),
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UserPass { .. } => "user_pass",
            Self::ServicePrincipal { .. } => "service_principal",
        }
    }
}

impl fmt::Debug for ConnectionAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UserPass {
                subscription_id,
                username,
                cloud_environment,
                ..
            } => f
                .debug_struct("UserPass")
                .field("subscription_id", subscription_id)
                .field("username", username)
                .field("password", &"<redacted>")
                .field("cloud_environment", cloud_environment)
                .finish(),
            Self::ServicePrincipal {
                subscription_id,
                tenant,
                client_id,
                cloud_environment,
                ..
            } => f
                .debug_struct("ServicePrincipal")
                .field("subscription_id", subscription_id)
                .field("tenant", tenant)
                .field("client_id", client_id)
                .field("secret", &"<redacted>")
                .field("cloud_environment", cloud_environment)
                .finish(),
        }
    }
}

fn required(map: &Map<String, Value>, key: &str) -> Result<String> {
    match map.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(Error::invalid_auth(format!("{key} is empty"))),
        Some(Value::Null) | None => Err(Error::invalid_auth(format!("missing {key}"))),
        Some(_) => Err(Error::invalid_auth(format!("{key} must be a string"))),
    }
}

fn missing_keys<'a>(map: &Map<String, Value>, keys: &[&'a str]) -> Vec<&'a str> {
    keys.iter()
        .copied()
        .filter(|k| matches!(map.get(*k), None | Some(Value::Null)))
        .collect()
}

/// Desired state of a resource group.
///
/// `location` and `managed_by` only matter at creation; Resource Manager
/// does not allow changing them afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroupSpec {
    /// Resource group name (unique within a subscription)
    pub name: String,
    /// Azure region, e.g. `westus`
    pub location: String,
    /// Resource id of whatever manages this group
    pub managed_by: Option<String>,
    /// Tag metadata
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ResourceGroupSpec {
    /// Create a spec without tags or manager.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            managed_by: None,
            tags: BTreeMap::new(),
        }
    }

    /// Set the managing resource id.
    pub fn with_managed_by(mut self, managed_by: impl Into<String>) -> Self {
        self.managed_by = Some(managed_by.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Replace all tags.
    pub fn with_tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }
}

/// A resource group as it exists in the cloud.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroup {
    /// Full resource id
    pub id: String,
    /// Resource group name
    pub name: String,
    /// Azure region
    pub location: String,
    /// Resource id of whatever manages this group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_by: Option<String>,
    /// Tag metadata
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    /// e.g. `Succeeded`, `Deleting`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl ResourceGroup {
    /// Build the record a spec describes within a subscription.
    pub fn from_spec(subscription_id: &str, spec: &ResourceGroupSpec) -> Self {
        Self {
            id: format!(
                "/subscriptions/{}/resourceGroups/{}",
                subscription_id, spec.name
            ),
            name: spec.name.clone(),
            location: spec.location.clone(),
            managed_by: spec.managed_by.clone(),
            tags: spec.tags.clone(),
            provisioning_state: Some("Succeeded".to_string()),
        }
    }
}
