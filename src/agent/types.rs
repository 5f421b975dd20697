//! Type definitions for the agent module

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::providers::{ResultEnvelope, ToolCall};

/// What a history entry records: a real tool invocation or a synthetic
/// notice from the loop itself (guard actions, aborts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepCommand {
    /// A tool call proposed by the model
    Call(ToolCall),
    /// A synthetic loop-generated record
    Notice(SystemNotice),
}

impl StepCommand {
    /// Tool name when this is a call
    pub fn tool_name(&self) -> Option<&str> {
        match self {
            StepCommand::Call(call) => Some(&call.name),
            StepCommand::Notice(_) => None,
        }
    }
}

/// Synthetic entry used by the loop to record guard actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemNotice {
    pub notice: String,
}

impl SystemNotice {
    pub fn new(notice: impl Into<String>) -> Self {
        SystemNotice {
            notice: notice.into(),
        }
    }
}

/// One appended step: the command, its normalized result, and the streamed
/// intermediate summary once available.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: StepCommand,
    pub result: ResultEnvelope,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl HistoryEntry {
    /// Entry for an executed (or cancelled) tool call
    pub fn call(call: ToolCall, result: ResultEnvelope) -> Self {
        HistoryEntry {
            command: StepCommand::Call(call),
            result,
            summary: None,
        }
    }

    /// Entry for a loop-generated notice
    pub fn notice(notice: impl Into<String>, result: ResultEnvelope) -> Self {
        HistoryEntry {
            command: StepCommand::Notice(SystemNotice::new(notice)),
            result,
            summary: None,
        }
    }
}

/// How a loop invocation finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The model declared the goal complete (or max steps elapsed)
    Success,
    /// The user (or a cancellation signal) stopped the run
    Stopped,
    /// A guard aborted the run
    Error,
}

/// The result of running the step loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// The full history, including entries inherited from the session
    pub results: Vec<HistoryEntry>,
    /// Human summary; empty when a hard stop aborted before summarization
    pub final_summary: String,
}

/// Re-encode a result so nothing non-serializable remains in history.
///
/// Conversion happens once, at provider egress: non-finite floats (the one
/// JSON-unrepresentable value a native library can leak through
/// `serde_json::Value`) are flattened to strings.
pub fn sanitize_envelope(envelope: ResultEnvelope) -> ResultEnvelope {
    ResultEnvelope {
        payload: sanitize_value(envelope.payload),
        ..envelope
    }
}

fn sanitize_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            Value::Object(map.into_iter().map(|(k, v)| (k, sanitize_value(v))).collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Value::String(f.to_string());
                }
            }
            Value::Number(n)
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_entry_serializes_flat_command() {
        let entry = HistoryEntry::call(
            ToolCall::new("list_directory", json!({"path": "./tmp"})),
            ResultEnvelope::success("ok"),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["command"]["name"], "list_directory");
        assert_eq!(value["result"]["status"], "success");
        assert!(value.get("summary").is_none());
    }

    #[test]
    fn notice_entries_roundtrip() {
        let entry = HistoryEntry::notice("repeated call rejected", ResultEnvelope::info("rejected"));
        let value = serde_json::to_value(&entry).unwrap();
        let back: HistoryEntry = serde_json::from_value(value).unwrap();
        match back.command {
            StepCommand::Notice(notice) => assert_eq!(notice.notice, "repeated call rejected"),
            StepCommand::Call(_) => panic!("expected notice"),
        }
    }

    #[test]
    fn sanitize_keeps_ordinary_values() {
        let envelope = ResultEnvelope::success(json!({"count": 3, "text": "x"}));
        let sanitized = sanitize_envelope(envelope);
        assert_eq!(sanitized.payload["count"], 3);
    }
}
