//! Tool plugin contract
//!
//! Each plugin module exposes three hooks: capability tags, the tool
//! descriptors it owns, and a dispatch entry. Plugins register themselves
//! into the local provider's table at startup; there is no runtime
//! discovery.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::providers::{ResultEnvelope, ToolDescriptor};

/// A plugin owning one or more tools
#[async_trait]
pub trait ToolPlugin: Send + Sync {
    /// Capability tags contributed by this plugin
    fn capabilities(&self) -> Vec<String>;

    /// Descriptors for every tool this plugin dispatches
    fn tools(&self) -> Vec<ToolDescriptor>;

    /// Execute one of this plugin's tools.
    ///
    /// Tool-level failures are reported inside the envelope; `Err` is
    /// reserved for broken invocations (the local provider converts those
    /// into error envelopes too).
    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope>;
}

/// Extract a required string argument
pub(crate) fn required_str<'a>(arguments: &'a Value, key: &str) -> Result<&'a str> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| crate::Error::InvalidInput(format!("Missing '{}' parameter", key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_str_reads_present_keys() {
        let args = json!({"path": "/tmp"});
        assert_eq!(required_str(&args, "path").unwrap(), "/tmp");
    }

    #[test]
    fn required_str_rejects_missing_keys() {
        let args = json!({});
        assert!(required_str(&args, "path").is_err());
    }
}
