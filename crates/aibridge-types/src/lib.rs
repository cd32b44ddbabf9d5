//! Shared types for the aibridge provider adapters.
//!
//! - `BridgeError`: unified error taxonomy surfaced by every adapter
//! - `Credential`: opaque secret used to authenticate against a vendor

use std::fmt;

/// Unified error type for all aibridge adapters.
///
/// Vendor transport and SDK failures are translated into these variants at the
/// client boundary, so callers never see vendor-specific error types.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // === Configuration Errors ===
    #[error("Credential '{reference}' could not be resolved")]
    CredentialNotFound { reference: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider '{0}' is not registered")]
    UnknownProvider(String),

    // === Request Errors ===
    #[error("The role {role} is not supported by the {provider} provider")]
    UnsupportedRole { provider: String, role: String },

    #[error("Operation '{operation}' is not supported by the {provider} provider")]
    UnsupportedOperation { provider: String, operation: String },

    // === Remote Errors ===
    #[error("Provider {provider} returned HTTP {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
        retryable: bool,
    },

    #[error("Rate limited by {provider}, retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    #[error("Authentication failed for provider {provider}")]
    Auth { provider: String },

    #[error("Malformed response from {provider}: {message}")]
    RemoteProtocol { provider: String, message: String },

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    pub fn remote_protocol(provider: impl Into<String>, message: impl Into<String>) -> Self {
        BridgeError::RemoteProtocol {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the error is transient and the operation may succeed on retry.
    ///
    /// Nothing in this workspace retries; the classification is for hosts that do.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::RateLimited { .. } | BridgeError::Provider { retryable: true, .. }
        )
    }

    /// Returns `true` if the error is permanent and retrying will not help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BridgeError::Auth { .. }
                | BridgeError::CredentialNotFound { .. }
                | BridgeError::InvalidConfig(_)
                | BridgeError::InvalidInput(_)
                | BridgeError::UnsupportedRole { .. }
                | BridgeError::UnsupportedOperation { .. }
                | BridgeError::UnknownProvider(_)
        )
    }
}

/// A convenience alias for `Result<T, BridgeError>`.
pub type Result<T> = std::result::Result<T, BridgeError>;

// ---------------------------------------------------------------------------
// Credential
// ---------------------------------------------------------------------------

/// Secret used to authenticate against a vendor API.
///
/// `Debug` and `Display` never print the secret itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The raw secret. Only transport code should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

impl From<&str> for Credential {
    fn from(secret: &str) -> Self {
        Self::new(secret)
    }
}

impl From<String> for Credential {
    fn from(secret: String) -> Self {
        Self(secret)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
