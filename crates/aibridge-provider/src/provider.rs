use async_trait::async_trait;
use std::collections::BTreeMap;

use aibridge_types::{Credential, Result};
use serde_json::{Map, Value};

use crate::{ApiDefinition, ChatInput, ChatOutput, EmbeddingsInput, EmbeddingsOutput, OperationType, SetupData};

// ---------------------------------------------------------------------------
// ProviderAdapter
// ---------------------------------------------------------------------------

/// Vendor-neutral contract every AI provider adapter implements.
///
/// Capability queries never touch the network. Operations that need the remote
/// client build it lazily from the stored (or resolved) credential.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> &str;
    fn label(&self) -> &str;

    /// `false` without a credential; with one, `true` unless `operation` is given
    /// and not supported.
    fn is_usable(&self, operation: Option<OperationType>) -> bool;
    fn supported_operation_types(&self) -> &[OperationType];
    fn setup_data(&self) -> SetupData;
    fn api_definition(&self) -> Result<ApiDefinition>;

    /// Per-model settings derived from the general ones.
    fn model_settings(&self, _model_id: &str, general: Map<String, Value>) -> Map<String, Value> {
        general
    }

    /// Embedding vector length for `model_id`; 0 when unknown.
    fn embedding_vector_size(&self, model_id: &str) -> usize;
    fn max_embedding_input(&self, model_id: &str) -> usize;

    fn set_credential(&mut self, credential: Credential);
    fn set_generation_config(&mut self, settings: &Map<String, Value>) -> Result<()>;
    fn set_system_instruction(&mut self, text: Option<&str>);

    /// Model id to display name, filtered for `operation`.
    async fn list_models(
        &mut self,
        operation: Option<OperationType>,
    ) -> Result<BTreeMap<String, String>>;
    async fn chat(&mut self, input: ChatInput, model_id: &str) -> Result<ChatOutput>;
    async fn embeddings(
        &mut self,
        input: EmbeddingsInput,
        model_id: &str,
    ) -> Result<EmbeddingsOutput>;
}
