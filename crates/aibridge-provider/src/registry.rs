use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use aibridge_types::{BridgeError, Result};

use crate::{ConfigStore, CredentialStore, GeminiProvider, ProviderAdapter};

// ---------------------------------------------------------------------------
// ProviderContext
// ---------------------------------------------------------------------------

/// Host services handed to a provider factory.
#[derive(Clone)]
pub struct ProviderContext {
    pub config: Arc<dyn ConfigStore>,
    pub credentials: Arc<dyn CredentialStore>,
    /// Shared HTTP transport used to build vendor clients.
    pub transport: reqwest::Client,
}

impl ProviderContext {
    pub fn new(config: Arc<dyn ConfigStore>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            config,
            credentials,
            transport: reqwest::Client::new(),
        }
    }

    pub fn with_transport(mut self, transport: reqwest::Client) -> Self {
        self.transport = transport;
        self
    }
}

// ---------------------------------------------------------------------------
// ProviderRegistry
// ---------------------------------------------------------------------------

pub type ProviderFactory = Box<dyn Fn(&ProviderContext) -> Box<dyn ProviderAdapter> + Send + Sync>;

struct ProviderEntry {
    label: String,
    factory: ProviderFactory,
}

/// Provider id to factory, populated at start-up and looked up by string key.
pub struct ProviderRegistry {
    providers: BTreeMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Registry with every adapter shipped in this crate.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(crate::gemini::PROVIDER_ID, crate::gemini::PROVIDER_LABEL, |ctx| {
            Box::new(GeminiProvider::from_context(ctx))
        });
        registry
    }

    /// Register a factory, replacing any previous one under the same id.
    pub fn register<F>(&mut self, id: impl Into<String>, label: impl Into<String>, factory: F)
    where
        F: Fn(&ProviderContext) -> Box<dyn ProviderAdapter> + Send + Sync + 'static,
    {
        let id = id.into();
        tracing::debug!(provider = %id, "registering provider");
        self.providers.insert(
            id,
            ProviderEntry {
                label: label.into(),
                factory: Box::new(factory),
            },
        );
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// `(id, label)` pairs in id order.
    pub fn providers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.providers
            .iter()
            .map(|(id, entry)| (id.as_str(), entry.label.as_str()))
    }

    pub fn create(&self, id: &str, ctx: &ProviderContext) -> Result<Box<dyn ProviderAdapter>> {
        let entry = self
            .providers
            .get(id)
            .ok_or_else(|| BridgeError::UnknownProvider(id.to_string()))?;
        Ok((entry.factory)(ctx))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
