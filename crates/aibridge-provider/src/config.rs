//! Host-supplied configuration and credential stores.

use std::collections::HashMap;

use aibridge_types::{BridgeError, Credential, Result};

// ---------------------------------------------------------------------------
// ConfigStore
// ---------------------------------------------------------------------------

/// Read-only key-value access to a provider's settings.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// In-memory settings, mostly for tests and embedding hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryConfig {
    values: HashMap<String, String>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

impl ConfigStore for MemoryConfig {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Settings read from environment variables named `{PREFIX}_{KEY}` (upper-cased).
/// Variable lookup used by the environment-backed stores.
pub type VarLookup = fn(&str) -> Option<String>;

fn process_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    prefix: String,
    lookup: VarLookup,
}

impl EnvConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            lookup: process_var,
        }
    }

    /// Read variables through `lookup` instead of the process environment.
    pub fn with_lookup(mut self, lookup: VarLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn var_name(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key).to_uppercase()
    }
}

impl ConfigStore for EnvConfig {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(&self.var_name(key)).filter(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// CredentialStore
// ---------------------------------------------------------------------------

/// Resolves a credential reference name to its secret.
pub trait CredentialStore: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<Credential>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    secrets: HashMap<String, Credential>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reference: impl Into<String>, secret: impl Into<Credential>) -> Self {
        self.secrets.insert(reference.into(), secret.into());
        self
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn resolve(&self, reference: &str) -> Result<Credential> {
        self.secrets
            .get(reference)
            .cloned()
            .ok_or_else(|| not_found(reference))
    }
}

/// Treats the reference as the name of an environment variable holding the secret.
#[derive(Debug, Clone, Copy)]
pub struct EnvCredentialStore {
    lookup: VarLookup,
}

impl EnvCredentialStore {
    pub fn new() -> Self {
        Self {
            lookup: process_var,
        }
    }

    /// Read variables through `lookup` instead of the process environment.
    pub fn with_lookup(lookup: VarLookup) -> Self {
        Self { lookup }
    }
}

impl Default for EnvCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for EnvCredentialStore {
    fn resolve(&self, reference: &str) -> Result<Credential> {
        match (self.lookup)(reference) {
            Some(secret) if !secret.is_empty() => Ok(Credential::new(secret)),
            _ => Err(not_found(reference)),
        }
    }
}

fn not_found(reference: &str) -> BridgeError {
    BridgeError::CredentialNotFound {
        reference: reference.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
