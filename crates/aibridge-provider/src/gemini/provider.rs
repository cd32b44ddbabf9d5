use async_trait::async_trait;
use futures_util::stream::StreamExt;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use aibridge_types::{BridgeError, Credential, Result};

use super::client::{GeminiApi, RestClientFactory};
use super::wire::{Content, GenerateContentRequest, GenerateContentResponse, Part};
use super::{PROVIDER_ID, PROVIDER_LABEL};
use crate::generation::STRUCTURED_OUTPUT;
use crate::{
    ApiDefinition, ChatDelta, ChatInput, ChatMessage, ChatOutput, ChatReply, ChatStream,
    ClientFactory, ClientPhase, ClientSlot, ConfigStore, CredentialStore, EmbeddingsInput,
    EmbeddingsOutput, GenerationConfig, OperationType, ProviderAdapter, ProviderContext, Role,
    RoleMapping, SetupData, Usage,
};

/// Config key holding the name of the credential to resolve.
pub const API_KEY_SETTING: &str = "api_key";
/// Optional config key overriding the API endpoint.
pub const BASE_URL_SETTING: &str = "base_url";

const MAX_EMBEDDING_INPUT: usize = 2048;

const SUPPORTED_OPERATIONS: &[OperationType] = &[OperationType::Chat, OperationType::Embeddings];

/// Gemini has no system role, and its `model` role is only accepted for turns the
/// model itself produced. System text is sent as a model turn and assistant turns
/// as user turns.
pub const GEMINI_ROLES: RoleMapping = RoleMapping {
    provider: PROVIDER_ID,
    system: "model",
    assistant: "user",
    native: &["user", "model"],
};

fn embedding_model_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"(?i)^models/.*embedding-").expect("embedding model pattern is valid")
    })
}

// ---------------------------------------------------------------------------
// GeminiProvider
// ---------------------------------------------------------------------------

pub struct GeminiProvider {
    config: Arc<dyn ConfigStore>,
    credentials: Arc<dyn CredentialStore>,
    client: ClientSlot<dyn GeminiApi>,
    generation: GenerationConfig,
    system_instruction: Option<Content>,
}

impl GeminiProvider {
    pub fn new(
        config: Arc<dyn ConfigStore>,
        credentials: Arc<dyn CredentialStore>,
        factory: Arc<dyn ClientFactory<dyn GeminiApi>>,
    ) -> Self {
        Self {
            config,
            credentials,
            client: ClientSlot::new(factory),
            generation: GenerationConfig::default(),
            system_instruction: None,
        }
    }

    /// Adapter talking to the REST API over the host transport.
    pub fn from_context(ctx: &ProviderContext) -> Self {
        let mut factory = RestClientFactory::new(ctx.transport.clone());
        if let Some(url) = ctx.config.get(BASE_URL_SETTING) {
            factory = factory.with_base_url(url);
        }
        Self::new(ctx.config.clone(), ctx.credentials.clone(), Arc::new(factory))
    }

    pub fn generation_config(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn system_instruction(&self) -> Option<&Content> {
        self.system_instruction.as_ref()
    }

    pub fn client_phase(&self) -> ClientPhase {
        self.client.phase()
    }

    /// The raw remote client, hot-swapping the credential first when one is given.
    pub fn client(&mut self, credential: Option<Credential>) -> Result<Arc<dyn GeminiApi>> {
        if let Some(credential) = credential {
            self.set_credential(credential);
        }
        self.load_client()
    }

    fn load_client(&mut self) -> Result<Arc<dyn GeminiApi>> {
        let config = &self.config;
        let credentials = &self.credentials;
        self.client.get_or_build(|| {
            let reference = config.get(API_KEY_SETTING).ok_or_else(|| {
                BridgeError::CredentialNotFound {
                    reference: API_KEY_SETTING.to_string(),
                }
            })?;
            tracing::debug!(provider = PROVIDER_ID, reference = %reference, "resolving credential");
            credentials.resolve(&reference)
        })
    }

    /// Vendor contents for `messages`: the cached system instruction first, then one
    /// content per message with its text followed by its images.
    pub fn build_contents(&self, messages: &[ChatMessage]) -> Result<Vec<Content>> {
        let roles = GEMINI_ROLES.map_all(messages)?;

        let mut contents = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = &self.system_instruction {
            contents.push(system.clone());
        }
        for (message, role) in messages.iter().zip(roles) {
            let mut parts = vec![Part::text(&message.text)];
            parts.extend(
                message
                    .images
                    .iter()
                    .map(|image| Part::blob(image.mime_type(), image.base64_data())),
            );
            contents.push(Content::new(role, parts));
        }
        Ok(contents)
    }

    fn request(&self, contents: Vec<Content>) -> GenerateContentRequest {
        let generation_config =
            (self.generation != GenerationConfig::default()).then(|| self.generation.clone());
        GenerateContentRequest {
            contents,
            generation_config,
        }
    }
}

#[async_trait]
impl ProviderAdapter for GeminiProvider {
    fn id(&self) -> &str {
        PROVIDER_ID
    }

    fn label(&self) -> &str {
        PROVIDER_LABEL
    }

    fn is_usable(&self, operation: Option<OperationType>) -> bool {
        let has_credential =
            self.client.credential().is_some() || self.config.get(API_KEY_SETTING).is_some();
        if !has_credential {
            return false;
        }
        match operation {
            Some(op) => SUPPORTED_OPERATIONS.contains(&op),
            None => true,
        }
    }

    fn supported_operation_types(&self) -> &[OperationType] {
        SUPPORTED_OPERATIONS
    }

    fn setup_data(&self) -> SetupData {
        let chat_model = "models/gemini-1.5-pro";
        let default_models = [
            ("chat", chat_model),
            ("chat_with_image_vision", chat_model),
            ("chat_with_complex_json", chat_model),
            ("embeddings", "models/embedding-001"),
        ]
        .into_iter()
        .map(|(op, model)| (op.to_string(), model.to_string()))
        .collect();

        SetupData {
            key_config_name: API_KEY_SETTING.to_string(),
            default_models,
        }
    }

    fn api_definition(&self) -> Result<ApiDefinition> {
        ApiDefinition::from_yaml(include_str!("../../definitions/gemini.yml"))
    }

    fn embedding_vector_size(&self, model_id: &str) -> usize {
        match model_id {
            "models/embedding-001" | "models/text-embedding-004" => 768,
            _ => 0,
        }
    }

    fn max_embedding_input(&self, _model_id: &str) -> usize {
        MAX_EMBEDDING_INPUT
    }

    fn set_credential(&mut self, credential: Credential) {
        self.client.set_credential(credential);
    }

    fn set_generation_config(&mut self, settings: &Map<String, Value>) -> Result<()> {
        self.generation = GenerationConfig::from_supported_settings(settings, STRUCTURED_OUTPUT)?;
        Ok(())
    }

    fn set_system_instruction(&mut self, text: Option<&str>) {
        self.system_instruction = text
            .filter(|t| !t.is_empty())
            .map(|t| Content::text(GEMINI_ROLES.system, t));
    }

    async fn list_models(
        &mut self,
        operation: Option<OperationType>,
    ) -> Result<BTreeMap<String, String>> {
        let client = self.load_client()?;
        let payload = client.list_models().await?;
        parse_model_list(&payload, operation)
    }

    async fn chat(&mut self, input: ChatInput, model_id: &str) -> Result<ChatOutput> {
        let contents = self.build_contents(&input.messages)?;
        let client = self.load_client()?;
        let request = self.request(contents);

        tracing::info!(
            provider = PROVIDER_ID,
            model = %model_id,
            messages = input.messages.len(),
            streamed = input.streamed,
            "chat request"
        );

        if input.streamed {
            let model = model_id.to_string();
            let stream = ChatStream::deferred(async move {
                let chunks = client.stream_generate_content(&model, &request).await?;
                Ok(chunks.map(|chunk| chunk.and_then(delta_from_chunk)).boxed())
            });
            return Ok(ChatOutput {
                message: ChatReply::Stream(stream),
                raw: Value::Null,
                metadata: Map::new(),
                usage: None,
            });
        }

        let response = client.generate_content(model_id, &request).await?;
        let text = if response.parts().is_empty() {
            String::new()
        } else {
            response.text()
        };
        let usage = response.usage_metadata.as_ref().map(|u| Usage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(ChatOutput {
            message: ChatReply::Complete(ChatMessage::new(Role::Assistant, text)),
            raw: serde_json::to_value(&response)?,
            metadata: Map::new(),
            usage,
        })
    }

    async fn embeddings(
        &mut self,
        input: EmbeddingsInput,
        model_id: &str,
    ) -> Result<EmbeddingsOutput> {
        let client = self.load_client()?;
        let response = client
            .embed_content(model_id, &input.prompt)
            .await
            .inspect_err(|e| {
                tracing::warn!(provider = PROVIDER_ID, model = %model_id, error = %e, "embedding failed")
            })?;

        let expected = self.embedding_vector_size(model_id);
        let actual = response.embedding.values.len();
        if expected != 0 && actual != expected {
            return Err(BridgeError::remote_protocol(
                PROVIDER_ID,
                format!("expected {expected} embedding values for {model_id}, got {actual}"),
            ));
        }

        let raw = serde_json::to_value(&response)?;
        Ok(EmbeddingsOutput {
            values: response.embedding.values,
            raw,
            metadata: Map::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

fn delta_from_chunk(chunk: GenerateContentResponse) -> Result<ChatDelta> {
    Ok(ChatDelta {
        raw: serde_json::to_value(&chunk)?,
        text: chunk.text(),
        finish_reason: chunk.finish_reason().map(String::from),
    })
}

/// Model id to display name. Embedding models are listed only for the embeddings
/// operation and hidden from every other listing.
fn parse_model_list(
    payload: &Value,
    operation: Option<OperationType>,
) -> Result<BTreeMap<String, String>> {
    let models = payload
        .get("models")
        .and_then(Value::as_array)
        .ok_or_else(|| BridgeError::remote_protocol(PROVIDER_ID, "missing 'models' list"))?;

    let mut listed = BTreeMap::new();
    for model in models {
        let name = model
            .get("name")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| BridgeError::remote_protocol(PROVIDER_ID, "model entry without a name"))?;
        let is_embedding = embedding_model_pattern().is_match(name);
        let wanted = match operation {
            Some(OperationType::Embeddings) => is_embedding,
            _ => !is_embedding,
        };
        if !wanted {
            continue;
        }
        let display = model
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or(name);
        listed.insert(name.to_string(), display.to_string());
    }
    Ok(listed)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
