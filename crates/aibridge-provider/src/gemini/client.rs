use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures_util::stream::{BoxStream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

use aibridge_types::{BridgeError, Credential, Result};

use super::wire::{
    Content, EmbedContentRequest, EmbedContentResponse, GenerateContentRequest,
    GenerateContentResponse,
};
use super::PROVIDER_ID;
use crate::ClientFactory;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

pub type ChunkStream = BoxStream<'static, Result<GenerateContentResponse>>;

// ---------------------------------------------------------------------------
// GeminiApi
// ---------------------------------------------------------------------------

/// The remote generative-language API, as the adapter consumes it.
#[async_trait]
pub trait GeminiApi: Send + Sync {
    /// Every model visible to the credential, as `{"models": [...]}`.
    async fn list_models(&self) -> Result<Value>;
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse>;
    async fn stream_generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ChunkStream>;
    async fn embed_content(&self, model: &str, text: &str) -> Result<EmbedContentResponse>;
}

// ---------------------------------------------------------------------------
// GeminiRestClient
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeminiRestClient {
    api_key: Credential,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiRestClient {
    pub fn new(api_key: Credential, http: reqwest::Client) -> Self {
        Self {
            api_key,
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/{}/{}:{}",
            self.base_url,
            API_VERSION,
            model_resource(model),
            method
        )
    }

    async fn post(&self, url: &str, body: &impl Serialize) -> Result<reqwest::Response> {
        let resp = self
            .http
            .post(url)
            .header("x-goog-api-key", self.api_key.expose())
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await
    }

    async fn get(&self, url: &str, query: &[(&str, &str)]) -> Result<reqwest::Response> {
        let resp = self
            .http
            .get(url)
            .header("x-goog-api-key", self.api_key.expose())
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp).await
    }
}

#[async_trait]
impl GeminiApi for GeminiRestClient {
    async fn list_models(&self) -> Result<Value> {
        let url = format!("{}/{}/models", self.base_url, API_VERSION);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", "1000")];
            if let Some(token) = page_token.as_deref() {
                query.push(("pageToken", token));
            }
            let page: Value = read_json(self.get(&url, &query).await?).await?;
            let page = page.as_object().ok_or_else(|| {
                BridgeError::remote_protocol(PROVIDER_ID, "model listing page is not an object")
            })?;

            page_token = page
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(String::from);

            // An empty object, or a page that only carries a token, lists no models.
            match page.get("models") {
                Some(Value::Array(items)) => models.extend(items.iter().cloned()),
                None if page.is_empty() || page_token.is_some() => {}
                None => {
                    return Err(BridgeError::remote_protocol(
                        PROVIDER_ID,
                        "model listing page has no 'models' list",
                    ))
                }
                Some(_) => {
                    return Err(BridgeError::remote_protocol(
                        PROVIDER_ID,
                        "'models' is not a list",
                    ))
                }
            }

            if page_token.is_none() {
                break;
            }
        }

        Ok(json!({ "models": models }))
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        let url = self.model_url(model, "generateContent");
        tracing::debug!(model, contents = request.contents.len(), "generateContent");
        read_json(self.post(&url, request).await?).await
    }

    async fn stream_generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<ChunkStream> {
        let url = format!("{}?alt=sse", self.model_url(model, "streamGenerateContent"));
        tracing::debug!(model, contents = request.contents.len(), "streamGenerateContent");
        let resp = self.post(&url, request).await?;

        let chunks = resp
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) if event.data.trim().is_empty() => None,
                    Ok(event) => Some(
                        serde_json::from_str::<GenerateContentResponse>(&event.data).map_err(
                            |e| {
                                BridgeError::remote_protocol(
                                    PROVIDER_ID,
                                    format!("undecodable stream chunk: {e}"),
                                )
                            },
                        ),
                    ),
                    Err(e) => Some(Err(BridgeError::Provider {
                        provider: PROVIDER_ID.into(),
                        status: 0,
                        message: format!("stream read failed: {e}"),
                        retryable: true,
                    })),
                }
            })
            .boxed();
        Ok(chunks)
    }

    async fn embed_content(&self, model: &str, text: &str) -> Result<EmbedContentResponse> {
        let url = self.model_url(model, "embedContent");
        let body = EmbedContentRequest {
            model: model_resource(model),
            content: Content {
                role: None,
                parts: vec![super::wire::Part::text(text)],
            },
        };
        read_json(self.post(&url, &body).await?).await
    }
}

/// Builds [`GeminiRestClient`]s on the host transport.
#[derive(Debug, Clone)]
pub struct RestClientFactory {
    http: reqwest::Client,
    base_url: String,
}

impl RestClientFactory {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

impl ClientFactory<dyn GeminiApi> for RestClientFactory {
    fn build(&self, credential: &Credential) -> Result<Arc<dyn GeminiApi>> {
        if credential.is_empty() {
            return Err(BridgeError::Auth {
                provider: PROVIDER_ID.into(),
            });
        }
        Ok(Arc::new(
            GeminiRestClient::new(credential.clone(), self.http.clone())
                .with_base_url(self.base_url.clone()),
        ))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `gemini-1.5-pro` and `models/gemini-1.5-pro` both name `models/gemini-1.5-pro`.
pub fn model_resource(model: &str) -> String {
    if model.starts_with("models/") || model.starts_with("tunedModels/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T> {
    let body = resp.text().await.map_err(transport_error)?;
    serde_json::from_str(&body).map_err(|e| {
        BridgeError::remote_protocol(PROVIDER_ID, format!("failed to parse response JSON: {e}"))
    })
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(map_error(status, &body))
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    BridgeError::Provider {
        provider: PROVIDER_ID.into(),
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        message: e.to_string(),
        retryable: true,
    }
}

fn map_error(status: reqwest::StatusCode, body: &str) -> BridgeError {
    let status_u16 = status.as_u16();
    match status_u16 {
        429 => BridgeError::RateLimited {
            provider: PROVIDER_ID.into(),
            retry_after_ms: 1000,
        },
        401 | 403 => BridgeError::Auth {
            provider: PROVIDER_ID.into(),
        },
        500..=599 => BridgeError::Provider {
            provider: PROVIDER_ID.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => BridgeError::Provider {
            provider: PROVIDER_ID.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
