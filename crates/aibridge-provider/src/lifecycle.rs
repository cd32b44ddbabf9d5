//! Remote client lifecycle: `Unconfigured -> Configured -> Built`.
//!
//! An adapter owns one [`ClientSlot`]. The client is built on first use and memoized;
//! replacing the credential drops it so the next operation rebuilds with the new one.

use std::fmt;
use std::sync::Arc;

use aibridge_types::{Credential, Result};

/// Builds a vendor client for a credential.
pub trait ClientFactory<C: ?Sized>: Send + Sync {
    fn build(&self, credential: &Credential) -> Result<Arc<C>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientPhase {
    Unconfigured,
    Configured,
    Built,
}

enum ClientState<C: ?Sized> {
    Unconfigured,
    Configured {
        credential: Credential,
    },
    Built {
        credential: Credential,
        client: Arc<C>,
    },
}

pub struct ClientSlot<C: ?Sized> {
    state: ClientState<C>,
    factory: Arc<dyn ClientFactory<C>>,
}

impl<C: ?Sized> ClientSlot<C> {
    pub fn new(factory: Arc<dyn ClientFactory<C>>) -> Self {
        Self {
            state: ClientState::Unconfigured,
            factory,
        }
    }

    pub fn phase(&self) -> ClientPhase {
        match self.state {
            ClientState::Unconfigured => ClientPhase::Unconfigured,
            ClientState::Configured { .. } => ClientPhase::Configured,
            ClientState::Built { .. } => ClientPhase::Built,
        }
    }

    pub fn credential(&self) -> Option<&Credential> {
        match &self.state {
            ClientState::Unconfigured => None,
            ClientState::Configured { credential } | ClientState::Built { credential, .. } => {
                Some(credential)
            }
        }
    }

    /// Store a new credential, discarding any built client.
    pub fn set_credential(&mut self, credential: Credential) {
        self.state = ClientState::Configured { credential };
    }

    /// Drop the built client while keeping the credential.
    pub fn invalidate(&mut self) {
        if let ClientState::Built { credential, .. } = &self.state {
            self.state = ClientState::Configured {
                credential: credential.clone(),
            };
        }
    }

    /// Return the memoized client, building it first if needed.
    ///
    /// `resolve` is only called from `Unconfigured`; its error aborts the call and
    /// leaves the slot untouched.
    pub fn get_or_build<F>(&mut self, resolve: F) -> Result<Arc<C>>
    where
        F: FnOnce() -> Result<Credential>,
    {
        if let ClientState::Built { client, .. } = &self.state {
            return Ok(Arc::clone(client));
        }

        let credential = match &self.state {
            ClientState::Configured { credential } => credential.clone(),
            _ => resolve()?,
        };

        let client = self.factory.build(&credential)?;
        tracing::debug!("remote client built");
        self.state = ClientState::Built {
            credential,
            client: Arc::clone(&client),
        };
        Ok(client)
    }
}

impl<C: ?Sized> fmt::Debug for ClientSlot<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSlot")
            .field("phase", &self.phase())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
