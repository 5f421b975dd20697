//! Local in-process tool provider
//!
//! Assembled from the plugin table at construction: capability tags are
//! unioned, descriptor lists concatenated, and a name -> plugin map built
//! for dispatch. Plugin failures never escape as errors; they become error
//! envelopes at this boundary.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ResultEnvelope, ToolDescriptor, ToolProvider};
use crate::error::Result;
use crate::tools::ToolPlugin;

/// Tool provider backed by in-process plugins
pub struct LocalProvider {
    id: String,
    plugins: Vec<Arc<dyn ToolPlugin>>,
    capabilities: Vec<String>,
    descriptors: Vec<ToolDescriptor>,
    /// Tool name -> index into `plugins`
    dispatch: HashMap<String, usize>,
    connected: AtomicBool,
}

impl LocalProvider {
    /// Build the provider from a plugin table.
    ///
    /// Later plugins lose name collisions; the first registrant keeps the
    /// tool and the duplicate is dropped with a warning.
    pub fn new(id: impl Into<String>, plugins: Vec<Arc<dyn ToolPlugin>>) -> Self {
        let id = id.into();
        let mut capabilities: Vec<String> = Vec::new();
        let mut descriptors = Vec::new();
        let mut dispatch = HashMap::new();

        for (index, plugin) in plugins.iter().enumerate() {
            for capability in plugin.capabilities() {
                if !capabilities.contains(&capability) {
                    capabilities.push(capability);
                }
            }
            for tool in plugin.tools() {
                if dispatch.contains_key(&tool.name) {
                    warn!(
                        "duplicate tool '{}' in local plugin table, keeping first registrant",
                        tool.name
                    );
                    continue;
                }
                dispatch.insert(tool.name.clone(), index);
                descriptors.push(tool);
            }
        }

        debug!(
            "local provider '{}' assembled: {} plugins, {} tools",
            id,
            plugins.len(),
            descriptors.len()
        );

        LocalProvider {
            id,
            plugins,
            capabilities,
            descriptors,
            dispatch,
            connected: AtomicBool::new(false),
        }
    }

    /// Number of tools in the table
    pub fn tool_count(&self) -> usize {
        self.descriptors.len()
    }
}

#[async_trait]
impl ToolProvider for LocalProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn capabilities(&self) -> Vec<String> {
        self.capabilities.clone()
    }

    async fn is_available(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn connect(&self) -> Result<()> {
        // Nothing to establish; the table was built at construction.
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        Ok(self.descriptors.clone())
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope> {
        let Some(&index) = self.dispatch.get(name) else {
            return Ok(ResultEnvelope::error(format!("Unknown tool: {}", name)));
        };

        match self.plugins[index].call(name, arguments).await {
            Ok(envelope) => Ok(envelope),
            Err(e) => {
                warn!("tool '{}' failed: {}", name, e);
                Ok(ResultEnvelope::error(format!("Tool error: {}", e)))
            }
        }
    }
}
