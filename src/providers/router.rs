//! Provider router
//!
//! Aggregates tool catalogs across providers, picks one provider per call,
//! falls back to alternates when a dispatch blows up, and routes
//! capability-level requests by the configured strategy.

use rand::prelude::IndexedRandom;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{ResultEnvelope, ToolDescriptor, ToolProvider};
use crate::config::RoutingStrategy;
use crate::error::{Error, Result};

/// A provider registered with the router
struct Registration {
    provider: Arc<dyn ToolProvider>,
    priority: i32,
}

/// Status row for the services listing
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub capabilities: Vec<String>,
    pub available: bool,
}

/// Routes tool calls and capability requests across providers
pub struct ToolRouter {
    providers: Vec<Registration>,
    strategy: RoutingStrategy,
}

impl ToolRouter {
    /// Create an empty router with a routing strategy
    pub fn new(strategy: RoutingStrategy) -> Self {
        ToolRouter {
            providers: Vec::new(),
            strategy,
        }
    }

    /// Register a provider. Registration order is the tie-break for equal
    /// priorities everywhere in the router.
    pub fn register(&mut self, provider: Arc<dyn ToolProvider>, priority: i32) {
        debug!("registering provider '{}' (priority {})", provider.id(), priority);
        self.providers.push(Registration { provider, priority });
    }

    /// Number of registered providers
    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Providers that currently answer their availability predicate,
    /// in registration order.
    async fn available_providers(&self) -> Vec<&Registration> {
        let mut available = Vec::new();
        for registration in &self.providers {
            if registration.provider.is_available().await {
                available.push(registration);
            }
        }
        available
    }

    /// Aggregate the catalog across providers.
    ///
    /// Descriptors are stamped with their provider id; duplicate names keep
    /// the first registrant and the rest are dropped with a warning.
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        let mut catalog: Vec<ToolDescriptor> = Vec::new();
        for registration in &self.providers {
            if !registration.provider.is_available().await {
                continue;
            }
            let provider_id = registration.provider.id().to_string();
            match registration.provider.list_tools().await {
                Ok(tools) => {
                    for mut tool in tools {
                        if catalog.iter().any(|existing| existing.name == tool.name) {
                            warn!(
                                "duplicate tool '{}' from provider '{}' dropped",
                                tool.name, provider_id
                            );
                            continue;
                        }
                        tool.provider_id = Some(provider_id.clone());
                        catalog.push(tool);
                    }
                }
                Err(e) => {
                    warn!("provider '{}' list_tools failed: {}", provider_id, e);
                }
            }
        }
        catalog
    }

    /// Status of every registered provider
    pub async fn service_status(&self) -> Vec<ProviderStatus> {
        let mut rows = Vec::new();
        for registration in &self.providers {
            rows.push(ProviderStatus {
                name: registration.provider.id().to_string(),
                capabilities: registration.provider.capabilities().await,
                available: registration.provider.is_available().await,
            });
        }
        rows
    }

    /// Providers whose current catalog contains `tool_name`, in
    /// registration order.
    async fn providers_for_tool(&self, tool_name: &str) -> Vec<&Registration> {
        let mut owners = Vec::new();
        for registration in self.available_providers().await {
            if let Ok(tools) = registration.provider.list_tools().await {
                if tools.iter().any(|tool| tool.name == tool_name) {
                    owners.push(registration);
                }
            }
        }
        owners
    }

    /// Dispatch a tool call.
    ///
    /// The first provider exposing the tool gets the call. A dispatch-level
    /// failure (not a tool-reported error) is retried on the remaining
    /// providers exposing the same name; those results carry the fallback
    /// mark. Raises only when no provider exposes the tool at all.
    pub async fn call(&self, tool_name: &str, arguments: Value) -> Result<ResultEnvelope> {
        let owners = self.providers_for_tool(tool_name).await;
        if owners.is_empty() {
            return Err(Error::NoProvider(tool_name.to_string()));
        }

        let mut last_error: Option<Error> = None;
        for (attempt, registration) in owners.iter().enumerate() {
            let provider_id = registration.provider.id().to_string();
            match registration
                .provider
                .call(tool_name, arguments.clone())
                .await
            {
                Ok(envelope) => {
                    let mut envelope = envelope.with_provider(provider_id);
                    if attempt > 0 {
                        envelope = envelope.with_fallback();
                    }
                    return Ok(envelope);
                }
                Err(e) => {
                    warn!(
                        "provider '{}' failed dispatching '{}': {}",
                        provider_id, tool_name, e
                    );
                    last_error = Some(e);
                }
            }
        }

        let message = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "all providers failed".to_string());
        Ok(ResultEnvelope::error(format!(
            "All providers failed to execute '{}': {}",
            tool_name, message
        )))
    }

    /// Pick one provider for a capability-level request.
    ///
    /// Strategy semantics:
    /// - capability_match: highest-priority provider whose capability set
    ///   covers the request, else the one with the largest intersection
    /// - priority_first: highest-priority available provider
    /// - load_balance: uniform random among available providers
    ///
    /// Priority ties always fall back to registration order.
    pub async fn select_provider(
        &self,
        required_capabilities: &[String],
    ) -> Option<Arc<dyn ToolProvider>> {
        let available = self.available_providers().await;
        if available.is_empty() {
            return None;
        }

        match self.strategy {
            RoutingStrategy::LoadBalance => {
                let mut rng = rand::rng();
                available
                    .choose(&mut rng)
                    .map(|registration| Arc::clone(&registration.provider))
            }
            RoutingStrategy::PriorityFirst => {
                sorted_by_priority(available)
                    .first()
                    .map(|registration| Arc::clone(&registration.provider))
            }
            RoutingStrategy::CapabilityMatch => {
                if required_capabilities.is_empty() {
                    return available
                        .first()
                        .map(|registration| Arc::clone(&registration.provider));
                }

                let ordered = sorted_by_priority(available);
                for registration in &ordered {
                    let capabilities = registration.provider.capabilities().await;
                    if required_capabilities
                        .iter()
                        .all(|needed| capabilities.contains(needed))
                    {
                        return Some(Arc::clone(&registration.provider));
                    }
                }

                // No full match: fall back to the largest intersection.
                let mut best: Option<(&Registration, usize)> = None;
                for registration in &ordered {
                    let capabilities = registration.provider.capabilities().await;
                    let matched = required_capabilities
                        .iter()
                        .filter(|needed| capabilities.contains(*needed))
                        .count();
                    if best.map(|(_, count)| matched > count).unwrap_or(true) {
                        best = Some((*registration, matched));
                    }
                }
                best.map(|(registration, _)| Arc::clone(&registration.provider))
            }
        }
    }

    /// Route a coarse command to one provider by capability set.
    ///
    /// Used by the CLI's direct mode: the selected provider receives the
    /// command as an `execute_shell` invocation, with failover to the other
    /// available providers on dispatch failure.
    pub async fn execute_command(
        &self,
        command: &str,
        required_capabilities: &[String],
    ) -> Result<ResultEnvelope> {
        let Some(selected) = self.select_provider(required_capabilities).await else {
            return Err(Error::NoProvider("no available provider".to_string()));
        };

        let arguments = serde_json::json!({ "command": command });
        match selected.call("execute_shell", arguments.clone()).await {
            Ok(envelope) => Ok(envelope.with_provider(selected.id().to_string())),
            Err(e) => {
                warn!("provider '{}' failed executing command: {}", selected.id(), e);
                for registration in self.available_providers().await {
                    if registration.provider.id() == selected.id() {
                        continue;
                    }
                    if let Ok(envelope) = registration
                        .provider
                        .call("execute_shell", arguments.clone())
                        .await
                    {
                        return Ok(envelope
                            .with_provider(registration.provider.id().to_string())
                            .with_fallback());
                    }
                }
                Ok(ResultEnvelope::error(format!(
                    "All providers failed to execute command: {}",
                    e
                )))
            }
        }
    }

    /// Connect every registered provider; a provider that refuses to connect
    /// is skipped with a warning, not fatal. Returns how many connected.
    pub async fn connect_all(&self) -> usize {
        let mut connected = 0;
        for registration in &self.providers {
            match registration.provider.connect().await {
                Ok(()) => connected += 1,
                Err(e) => {
                    warn!("provider '{}' failed to connect: {}", registration.provider.id(), e);
                }
            }
        }
        connected
    }

    /// Disconnect every provider
    pub async fn disconnect_all(&self) {
        for registration in &self.providers {
            registration.provider.disconnect().await;
        }
    }
}

/// Stable sort by priority descending; equal priorities keep registration
/// order.
fn sorted_by_priority<'a>(registrations: Vec<&'a Registration>) -> Vec<&'a Registration> {
    let mut sorted = registrations;
    sorted.sort_by(|a, b| b.priority.cmp(&a.priority));
    sorted
}
