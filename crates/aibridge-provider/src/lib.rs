//! Vendor-neutral AI provider adapters.
//!
//! Provides the `ProviderAdapter` trait, the `ProviderRegistry` that maps provider
//! ids to factories, the client lifecycle and pull-based chat stream shared by
//! adapters, and the Gemini adapter.

mod config;
mod definition;
pub mod gemini;
mod generation;
mod lifecycle;
mod provider;
mod registry;
mod roles;
mod stream;
mod types;

pub use aibridge_types::{BridgeError, Credential, Result};
pub use config::*;
pub use definition::*;
pub use gemini::GeminiProvider;
pub use generation::GenerationConfig;
pub use lifecycle::*;
pub use provider::*;
pub use registry::*;
pub use roles::RoleMapping;
pub use stream::{ChatDelta, ChatStream};
pub use types::*;
