//! Tool providers
//!
//! A provider is a source of tools: the local in-process plugin table or a
//! remote streamable tool server. Every provider speaks the same small
//! interface and every call result is collapsed into a [`ResultEnvelope`]
//! at the provider boundary, regardless of the provider's native shape.
//!
//! ## Architecture
//!
//! - **local**: plugin-backed provider assembled at startup
//! - **remote**: streamable HTTP session to an external tool server
//! - **protocol**: wire frames for the remote session
//! - **router**: aggregation, per-tool dispatch, failover, capability routing

mod local;
mod protocol;
mod remote;
mod router;

pub use local::LocalProvider;
pub use protocol::{CallToolResult, ContentBlock, RpcError, RpcRequest, RpcResponse, WireTool};
pub use remote::{RemoteProvider, SessionState};
pub use router::{ProviderStatus, ToolRouter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

/// Describes one invokable tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within its provider
    pub name: String,
    /// Free-text description shown to the model
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool arguments
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
    /// Stamped by the router at aggregation time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
}

impl ToolDescriptor {
    /// Create a descriptor with an object-typed argument schema
    pub fn new(name: impl Into<String>, description: impl Into<String>, schema: Value) -> Self {
        ToolDescriptor {
            name: name.into(),
            description: description.into(),
            input_schema: schema,
            provider_id: None,
        }
    }
}

/// A tool invocation proposed by the model and consumed by the router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool name
    pub name: String,
    /// Arguments as parameter name -> JSON value
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    /// Create a call from a name and a JSON object
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        ToolCall {
            name: name.into(),
            arguments: arguments.as_object().cloned().unwrap_or_default(),
        }
    }

    /// Arguments as a JSON value
    pub fn arguments_value(&self) -> Value {
        Value::Object(self.arguments.clone())
    }
}

/// Terminal status of a tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    /// The tool ran and reported success
    Success,
    /// The tool ran and reported failure, or dispatch failed
    Error,
    /// The invocation was declined before execution
    Cancelled,
    /// Informational record (guard notices and the like)
    Info,
}

impl std::fmt::Display for EnvelopeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvelopeStatus::Success => write!(f, "success"),
            EnvelopeStatus::Error => write!(f, "error"),
            EnvelopeStatus::Cancelled => write!(f, "cancelled"),
            EnvelopeStatus::Info => write!(f, "info"),
        }
    }
}

/// The normalized result record produced by every provider call.
///
/// Heterogeneous native shapes (bare mappings, wire `CallToolResult`s,
/// provider exceptions) are accepted only through the constructors here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Terminal status
    pub status: EnvelopeStatus,
    /// Free-form result value; textual output, structured data, or both
    #[serde(default)]
    pub payload: Value,
    /// Which provider produced the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Present when status is `error` or `cancelled`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Set by the router when the result came from a failover provider
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl ResultEnvelope {
    /// Create a successful result
    pub fn success(payload: impl Into<Value>) -> Self {
        ResultEnvelope {
            status: EnvelopeStatus::Success,
            payload: payload.into(),
            provider_id: None,
            error_message: None,
            fallback: false,
        }
    }

    /// Create a failed result
    pub fn error(message: impl Into<String>) -> Self {
        ResultEnvelope {
            status: EnvelopeStatus::Error,
            payload: Value::Null,
            provider_id: None,
            error_message: Some(message.into()),
            fallback: false,
        }
    }

    /// Create a cancelled result
    pub fn cancelled(message: impl Into<String>) -> Self {
        ResultEnvelope {
            status: EnvelopeStatus::Cancelled,
            payload: Value::Null,
            provider_id: None,
            error_message: Some(message.into()),
            fallback: false,
        }
    }

    /// Create an informational result
    pub fn info(payload: impl Into<Value>) -> Self {
        ResultEnvelope {
            status: EnvelopeStatus::Info,
            payload: payload.into(),
            provider_id: None,
            error_message: None,
            fallback: false,
        }
    }

    /// Normalize a native mapping-shaped result.
    ///
    /// Mappings carrying a recognized `status` field pass through: the status
    /// is lifted, `error` becomes the error message, and the remaining fields
    /// (or an explicit `payload`/`result` field) become the payload. Anything
    /// else is wrapped whole as a success payload.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return ResultEnvelope::success(value);
        };

        let status = match map.get("status").and_then(Value::as_str) {
            Some("success") => EnvelopeStatus::Success,
            Some("error") => EnvelopeStatus::Error,
            Some("cancelled") => EnvelopeStatus::Cancelled,
            Some("info") => EnvelopeStatus::Info,
            _ => return ResultEnvelope::success(Value::Object(map)),
        };
        map.remove("status");

        let error_message = map
            .remove("error")
            .and_then(|v| match v {
                Value::String(s) => Some(s),
                other => Some(other.to_string()),
            })
            .filter(|s| !s.is_empty());

        let payload = if let Some(payload) = map.remove("payload") {
            payload
        } else if let Some(result) = map.remove("result") {
            result
        } else if map.is_empty() {
            Value::Null
        } else {
            Value::Object(map)
        };

        ResultEnvelope {
            status,
            payload,
            provider_id: None,
            error_message,
            fallback: false,
        }
    }

    /// Normalize a wire-level `CallToolResult`.
    ///
    /// Textual content blocks are concatenated into a single string; any
    /// structured-content blob is appended as a trailing annotation.
    pub fn from_wire(result: CallToolResult) -> Self {
        let mut text: String = result
            .content
            .iter()
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n");

        if let Some(structured) = &result.structured_content {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&format!("structured content: {}", structured));
        }

        if result.is_error {
            ResultEnvelope {
                status: EnvelopeStatus::Error,
                payload: Value::String(text.clone()),
                provider_id: None,
                error_message: Some(if text.is_empty() {
                    "tool reported an error".to_string()
                } else {
                    text
                }),
                fallback: false,
            }
        } else {
            ResultEnvelope::success(text)
        }
    }

    /// Attach the producing provider's id
    pub fn with_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.provider_id = Some(provider_id.into());
        self
    }

    /// Mark the envelope as coming from a failover provider
    pub fn with_fallback(mut self) -> Self {
        self.fallback = true;
        self
    }

    /// Whether the invocation succeeded
    pub fn is_success(&self) -> bool {
        self.status == EnvelopeStatus::Success
    }
}

/// A source of tools
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Stable identifier used for provider stamping and routing
    fn id(&self) -> &str;

    /// Capability tags this provider advertises
    async fn capabilities(&self) -> Vec<String>;

    /// Whether the provider can currently serve calls
    async fn is_available(&self) -> bool;

    /// Establish the provider's connection
    async fn connect(&self) -> Result<()>;

    /// Release the provider's connection; idempotent
    async fn disconnect(&self);

    /// Current tool catalog
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;

    /// Invoke a tool. Errors here mean the dispatch itself failed; a tool
    /// that ran and failed returns an `error` envelope instead.
    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mapping_with_status_passes_through() {
        let envelope = ResultEnvelope::from_value(json!({
            "status": "success",
            "stdout": "hello",
            "returncode": 0
        }));
        assert_eq!(envelope.status, EnvelopeStatus::Success);
        assert_eq!(envelope.payload["stdout"], "hello");
    }

    #[test]
    fn mapping_with_error_status_lifts_the_message() {
        let envelope = ResultEnvelope::from_value(json!({
            "status": "error",
            "error": "no such file"
        }));
        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert_eq!(envelope.error_message.as_deref(), Some("no such file"));
    }

    #[test]
    fn mapping_without_status_becomes_success_payload() {
        let envelope = ResultEnvelope::from_value(json!({"rows": [1, 2, 3]}));
        assert!(envelope.is_success());
        assert_eq!(envelope.payload["rows"], json!([1, 2, 3]));
    }

    #[test]
    fn scalar_becomes_success_payload() {
        let envelope = ResultEnvelope::from_value(json!("plain text"));
        assert!(envelope.is_success());
        assert_eq!(envelope.payload, json!("plain text"));
    }

    #[test]
    fn wire_result_concatenates_text_blocks() {
        let result = CallToolResult {
            content: vec![
                ContentBlock {
                    content_type: "text".into(),
                    text: Some("line one".into()),
                },
                ContentBlock {
                    content_type: "text".into(),
                    text: Some("line two".into()),
                },
            ],
            is_error: false,
            structured_content: Some(json!({"count": 2})),
        };
        let envelope = ResultEnvelope::from_wire(result);
        assert!(envelope.is_success());
        let text = envelope.payload.as_str().unwrap();
        assert!(text.starts_with("line one\nline two"));
        assert!(text.contains("structured content:"));
    }

    #[test]
    fn wire_error_maps_to_error_status() {
        let result = CallToolResult {
            content: vec![ContentBlock {
                content_type: "text".into(),
                text: Some("boom".into()),
            }],
            is_error: true,
            structured_content: None,
        };
        let envelope = ResultEnvelope::from_wire(result);
        assert_eq!(envelope.status, EnvelopeStatus::Error);
        assert_eq!(envelope.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn envelope_always_serializes_status_and_payload() {
        let value = serde_json::to_value(ResultEnvelope::error("nope")).unwrap();
        assert_eq!(value["status"], "error");
        assert!(value.get("payload").is_some());
    }
}
