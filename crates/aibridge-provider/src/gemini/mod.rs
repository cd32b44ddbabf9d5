//! Google Gemini adapter and its generative-language API client.

mod client;
mod provider;
pub mod wire;

pub use client::{model_resource, ChunkStream, GeminiApi, GeminiRestClient, RestClientFactory, DEFAULT_BASE_URL};
pub use provider::{GeminiProvider, API_KEY_SETTING, BASE_URL_SETTING, GEMINI_ROLES};

pub const PROVIDER_ID: &str = "gemini";
pub const PROVIDER_LABEL: &str = "Gemini";
