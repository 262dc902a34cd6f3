//! Error types for Azure Resource Manager operations.
//!
//! Errors are categorized so callers can give appropriate user feedback.
//! No category is retried automatically; every error is terminal for the
//! call that produced it.

use thiserror::Error;

/// Categories of Resource Manager errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed or incomplete connection settings
    Config,
    /// Token could not be acquired
    Auth,
    /// The resource group does not exist
    NotFound,
    /// Connection, DNS, TLS or timeout problems
    Network,
    /// The API returned an error payload
    Api,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Invalid connection settings",
            Self::Auth => "Authentication failed",
            Self::NotFound => "Resource group not found",
            Self::Network => "Network connectivity issue",
            Self::Api => "Resource Manager rejected the request",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => {
                "Provide subscription_id plus username/password or tenant/client_id/secret"
            }
            Self::Auth => "Check the credentials and that the account can access the subscription",
            Self::NotFound => "Verify the resource group name and subscription",
            Self::Network => "Check your internet connection and the cloud_environment setting",
            Self::Api => "Check the error code in the message and the request parameters",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur during Resource Manager operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Connection settings are malformed or incomplete
    #[error("invalid connection settings: {message}")]
    InvalidAuth {
        /// What is wrong with the settings
        message: String,
    },

    /// Resource group name cannot be used in a request path
    #[error("invalid resource group name '{name}': {reason}")]
    InvalidName {
        /// The rejected name
        name: String,
        /// Why it was rejected
        reason: String,
    },

    /// Token acquisition failed
    #[error("authentication failed: {message}")]
    Authentication {
        /// Message returned by the token endpoint
        message: String,
    },

    /// Resource group does not exist
    #[error("resource group not found: {name}")]
    NotFound {
        /// Name of the missing resource group
        name: String,
    },

    /// Error payload returned by the API
    #[error("{code}: {message} (HTTP {status})")]
    Api {
        /// HTTP status code
        status: u16,
        /// Resource Manager error code (e.g. `InvalidResourceGroupLocation`)
        code: String,
        /// Resource Manager error message
        message: String,
    },

    /// Network-related error (connection, timeout, DNS, etc.)
    #[error("network error: {message}")]
    Network {
        /// Detailed error message from the failed network operation
        message: String,
    },

    /// A long-running operation did not finish in time
    #[error("timed out waiting for {operation}")]
    Timeout {
        /// Operation that was being awaited
        operation: String,
    },

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidAuth { .. } | Error::InvalidName { .. } => ErrorCategory::Config,
            Error::Authentication { .. } => ErrorCategory::Auth,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::Api { status: 401 | 403, .. } => ErrorCategory::Auth,
            Error::Api { status: 404, .. } => ErrorCategory::NotFound,
            Error::Api { .. } => ErrorCategory::Api,
            Error::Network { .. } | Error::Timeout { .. } => ErrorCategory::Network,
            Error::InvalidResponse(_) | Error::Other(_) => ErrorCategory::Other,
        }
    }

    pub(crate) fn invalid_auth(message: impl Into<String>) -> Self {
        Error::InvalidAuth {
            message: message.into(),
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                code: "HttpError".to_string(),
                message: format!("HTTP {code}"),
            },
            other => Self::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

/// Result type for Resource Manager operations.
pub type Result<T> = std::result::Result<T, Error>;
