//! Sampling and formatting parameters, normalized from host-submitted settings.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use aibridge_types::{BridgeError, Result};

/// Vendor-neutral generation parameters.
///
/// Built from the loosely-typed settings a host form submits. Adapters strip the
/// fields their vendor cannot honour before the config is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

/// Setting keys understood by [`GenerationConfig::from_settings`].
pub const RESPONSE_MIME_TYPE: &str = "responseMimeType";
pub const RESPONSE_SCHEMA: &str = "responseSchema";

/// Structured-output controls, for vendors that cannot honour them.
pub const STRUCTURED_OUTPUT: &[&str] = &[RESPONSE_MIME_TYPE, RESPONSE_SCHEMA];

impl GenerationConfig {
    /// Normalize raw settings.
    ///
    /// Keys may be camelCase or snake_case. `stopSequences` accepts a comma-delimited
    /// string or an array; numbers may arrive as strings. Unknown keys are dropped.
    /// Empty strings and nulls count as "not set".
    pub fn from_settings(settings: &Map<String, Value>) -> Result<Self> {
        Self::from_supported_settings(settings, &[])
    }

    /// Like [`from_settings`](Self::from_settings), but keys whose canonical name is
    /// in `unsupported` are dropped unparsed, whatever their value.
    pub fn from_supported_settings(
        settings: &Map<String, Value>,
        unsupported: &[&str],
    ) -> Result<Self> {
        let mut config = GenerationConfig::default();

        for (key, value) in settings {
            let canonical = canonical_key(key);
            if canonical.is_some_and(|name| unsupported.contains(&name)) {
                tracing::debug!(setting = %key, "setting not supported by the vendor, dropped");
                continue;
            }
            if value.is_null() || value.as_str().is_some_and(|s| s.trim().is_empty()) {
                continue;
            }
            match canonical {
                Some("stopSequences") => config.stop_sequences = parse_list(key, value)?,
                Some("temperature") => config.temperature = Some(parse_f32(key, value)?),
                Some("topP") => config.top_p = Some(parse_f32(key, value)?),
                Some("topK") => config.top_k = Some(parse_u32(key, value)?),
                Some("maxOutputTokens") => config.max_output_tokens = Some(parse_u32(key, value)?),
                Some("candidateCount") => config.candidate_count = Some(parse_u32(key, value)?),
                Some("presencePenalty") => config.presence_penalty = Some(parse_f32(key, value)?),
                Some("frequencyPenalty") => {
                    config.frequency_penalty = Some(parse_f32(key, value)?)
                }
                Some("seed") => config.seed = Some(parse_i64(key, value)?),
                Some(RESPONSE_MIME_TYPE) => {
                    config.response_mime_type = Some(parse_string(key, value)?)
                }
                Some(RESPONSE_SCHEMA) => config.response_schema = Some(parse_schema(key, value)?),
                _ => tracing::debug!(setting = %key, "ignoring unknown generation setting"),
            }
        }

        Ok(config)
    }
}

fn canonical_key(key: &str) -> Option<&'static str> {
    Some(match key {
        "stopSequences" | "stop_sequences" | "stop" => "stopSequences",
        "temperature" => "temperature",
        "topP" | "top_p" => "topP",
        "topK" | "top_k" => "topK",
        "maxOutputTokens" | "max_output_tokens" | "max_tokens" => "maxOutputTokens",
        "candidateCount" | "candidate_count" => "candidateCount",
        "presencePenalty" | "presence_penalty" => "presencePenalty",
        "frequencyPenalty" | "frequency_penalty" => "frequencyPenalty",
        "seed" => "seed",
        "responseMimeType" | "response_mime_type" => RESPONSE_MIME_TYPE,
        "responseSchema" | "response_schema" => RESPONSE_SCHEMA,
        _ => return None,
    })
}

fn invalid(key: &str, value: &Value, expected: &str) -> BridgeError {
    BridgeError::InvalidConfig(format!("setting '{key}' expects {expected}, got {value}"))
}

fn parse_list(key: &str, value: &Value) -> Result<Vec<String>> {
    match value {
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect()),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(String::from)
                    .ok_or_else(|| invalid(key, value, "a list of strings"))
            })
            .collect(),
        _ => Err(invalid(key, value, "a comma-delimited string or list")),
    }
}

fn parse_f64(key: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| invalid(key, value, "a number")),
        Value::String(s) => s.trim().parse().map_err(|_| invalid(key, value, "a number")),
        _ => Err(invalid(key, value, "a number")),
    }
}

fn parse_f32(key: &str, value: &Value) -> Result<f32> {
    parse_f64(key, value).map(|v| v as f32)
}

fn parse_i64(key: &str, value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n.as_i64().ok_or_else(|| invalid(key, value, "an integer")),
        Value::String(s) => s.trim().parse().map_err(|_| invalid(key, value, "an integer")),
        _ => Err(invalid(key, value, "an integer")),
    }
}

fn parse_u32(key: &str, value: &Value) -> Result<u32> {
    let n = parse_i64(key, value)?;
    u32::try_from(n).map_err(|_| invalid(key, value, "a non-negative integer"))
}

fn parse_string(key: &str, value: &Value) -> Result<String> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| invalid(key, value, "a string"))
}

fn parse_schema(key: &str, value: &Value) -> Result<Value> {
    match value {
        Value::Object(_) => Ok(value.clone()),
        Value::String(s) => serde_json::from_str(s).map_err(|_| invalid(key, value, "a JSON schema")),
        _ => Err(invalid(key, value, "a JSON schema")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
