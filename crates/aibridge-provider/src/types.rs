use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use aibridge_types::BridgeError;

use crate::stream::ChatStream;

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Logical author of a chat turn.
///
/// Roles arrive from hosts as free-form strings; anything outside the known set is
/// kept as `Other` so the adapter can reject it with the offending name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    System,
    User,
    Assistant,
    Model,
    Tool,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Model => "model",
            Role::Tool => "tool",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        match value {
            "system" => Role::System,
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "model" => Role::Model,
            "tool" => Role::Tool,
            other => Role::Other(other.to_string()),
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::from(value.as_str())
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ImageAttachment
// ---------------------------------------------------------------------------

/// Inline binary content attached to a chat turn, held base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImage")]
pub struct ImageAttachment {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct RawImage {
    mime_type: String,
    data: String,
}

impl TryFrom<RawImage> for ImageAttachment {
    type Error = BridgeError;

    fn try_from(raw: RawImage) -> Result<Self, BridgeError> {
        Self::from_base64(raw.mime_type, raw.data)
    }
}

impl ImageAttachment {
    /// Wrap an already base64-encoded payload.
    pub fn from_base64(
        mime_type: impl Into<String>,
        data: impl Into<String>,
    ) -> Result<Self, BridgeError> {
        let data = data.into();
        if data.is_empty() {
            return Err(BridgeError::InvalidInput(
                "image attachment payload is empty".into(),
            ));
        }
        Ok(Self {
            mime_type: mime_type.into(),
            data,
        })
    }

    /// Encode raw bytes.
    pub fn from_bytes(mime_type: impl Into<String>, bytes: &[u8]) -> Result<Self, BridgeError> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Self::from_base64(mime_type, encoded)
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.data
    }
}

// ---------------------------------------------------------------------------
// ChatMessage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,
}

impl ChatMessage {
    pub fn new(role: impl Into<Role>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(Role::System, text)
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }
}

// ---------------------------------------------------------------------------
// ChatInput / ChatOutput
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ChatInput {
    pub messages: Vec<ChatMessage>,
    pub streamed: bool,
}

impl ChatInput {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            streamed: false,
        }
    }

    /// Request an incremental reply instead of a complete one.
    pub fn streamed(mut self, streamed: bool) -> Self {
        self.streamed = streamed;
        self
    }
}

impl From<Vec<ChatMessage>> for ChatInput {
    fn from(messages: Vec<ChatMessage>) -> Self {
        Self::new(messages)
    }
}

impl From<&str> for ChatInput {
    fn from(text: &str) -> Self {
        Self::new(vec![ChatMessage::user(text)])
    }
}

/// The reply half of a chat call: either the whole message or a pull-based stream.
pub enum ChatReply {
    Complete(ChatMessage),
    Stream(ChatStream),
}

impl fmt::Debug for ChatReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatReply::Complete(message) => f.debug_tuple("Complete").field(message).finish(),
            ChatReply::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[derive(Debug)]
pub struct ChatOutput {
    pub message: ChatReply,
    /// Vendor payload as received. `Null` for streamed replies; every delta carries
    /// its own raw chunk instead.
    pub raw: serde_json::Value,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub usage: Option<Usage>,
}

impl ChatOutput {
    /// Text of a complete reply; `None` for a stream.
    pub fn text(&self) -> Option<&str> {
        match &self.message {
            ChatReply::Complete(message) => Some(&message.text),
            ChatReply::Stream(_) => None,
        }
    }

    pub fn into_stream(self) -> Option<ChatStream> {
        match self.message {
            ChatReply::Stream(stream) => Some(stream),
            ChatReply::Complete(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Embeddings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddingsInput {
    pub prompt: String,
}

impl EmbeddingsInput {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

impl From<&str> for EmbeddingsInput {
    fn from(prompt: &str) -> Self {
        Self::new(prompt)
    }
}

impl From<String> for EmbeddingsInput {
    fn from(prompt: String) -> Self {
        Self { prompt }
    }
}

#[derive(Debug, Clone)]
pub struct EmbeddingsOutput {
    pub values: Vec<f32>,
    pub raw: serde_json::Value,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Usage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
}

// ---------------------------------------------------------------------------
// OperationType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Chat,
    Embeddings,
    Moderation,
    TextToImage,
    SpeechToText,
    TextToSpeech,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Chat => "chat",
            OperationType::Embeddings => "embeddings",
            OperationType::Moderation => "moderation",
            OperationType::TextToImage => "text_to_image",
            OperationType::SpeechToText => "speech_to_text",
            OperationType::TextToSpeech => "text_to_speech",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "chat" => Ok(OperationType::Chat),
            "embeddings" => Ok(OperationType::Embeddings),
            "moderation" => Ok(OperationType::Moderation),
            "text_to_image" => Ok(OperationType::TextToImage),
            "speech_to_text" => Ok(OperationType::SpeechToText),
            "text_to_speech" => Ok(OperationType::TextToSpeech),
            other => Err(BridgeError::InvalidInput(format!(
                "unknown operation type '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// SetupData
// ---------------------------------------------------------------------------

/// What a host needs to wire a provider up: where the credential reference lives
/// and which model to preselect per operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupData {
    pub key_config_name: String,
    pub default_models: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
