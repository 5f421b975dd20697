//! Sleep tool plugin
//!
//! The one built-in tool that is genuinely asynchronous; useful for pacing
//! UI automation flows and as the suspension-point exemplar in tests.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::traits::ToolPlugin;
use crate::error::Result;
use crate::providers::{ResultEnvelope, ToolDescriptor};

/// Built-in plugin: async sleep
pub struct SleepPlugin;

impl SleepPlugin {
    pub fn new() -> Self {
        SleepPlugin
    }
}

impl Default for SleepPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolPlugin for SleepPlugin {
    fn capabilities(&self) -> Vec<String> {
        vec!["timing".to_string()]
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![ToolDescriptor::new(
            "sleep",
            "Pause for a given duration before the next step",
            json!({
                "type": "object",
                "properties": {
                    "ms": {
                        "type": "integer",
                        "description": "Milliseconds to sleep"
                    },
                    "s": {
                        "type": "number",
                        "description": "Seconds to sleep (used when ms is absent)"
                    }
                }
            }),
        )]
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope> {
        if name != "sleep" {
            return Ok(ResultEnvelope::error(format!("Unknown tool: {}", name)));
        }

        let seconds = if let Some(ms) = arguments.get("ms").and_then(Value::as_u64) {
            ms as f64 / 1000.0
        } else if let Some(s) = arguments.get("s").and_then(Value::as_f64) {
            s
        } else {
            return Ok(ResultEnvelope::error("Either 'ms' or 's' is required"));
        };

        if !seconds.is_finite() || seconds < 0.0 {
            return Ok(ResultEnvelope::error("Sleep duration must be non-negative"));
        }

        tokio::time::sleep(std::time::Duration::from_secs_f64(seconds)).await;
        Ok(ResultEnvelope::success(json!({"slept": seconds})))
    }
}
