//! Agent orchestration
//!
//! The [`Agent`] wires configuration, the provider router, and the model
//! service together, and exposes the operations the front-ends consume:
//! the interactive step loop, one-shot planning, direct tool calls, and
//! capability analysis.
//!
//! - **step_loop**: the planner/executor state machine
//! - **signature**: call signatures and the repetition guard
//! - **interaction**: the operator channel seam
//! - **types**: history and outcome vocabulary

pub mod interaction;
pub mod signature;
pub mod step_loop;
pub mod types;

pub use interaction::{AutoInteraction, InteractionChannel, ScriptedInteraction, UserDecision};
pub use step_loop::{os_tag, StepLoop, StepLoopConfig};
pub use types::{HistoryEntry, RunOutcome, RunStatus, StepCommand, SystemNotice};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{Config, ProviderType};
use crate::error::{Error, Result};
use crate::llm::{self, LanguageModel};
use crate::providers::{
    LocalProvider, ProviderStatus, RemoteProvider, ResultEnvelope, ToolCall, ToolDescriptor,
    ToolRouter,
};
use crate::tools::builtin_plugins;

/// Result of the one-shot planning path
#[derive(Debug, Clone)]
pub enum PlanExecution {
    /// Dangerous calls present; nothing executed yet
    NeedConfirm {
        dangerous: Vec<ToolCall>,
        all: Vec<ToolCall>,
    },
    /// Calls executed in order
    Executed { results: Vec<HistoryEntry> },
}

/// The orchestrator: config + router + model service
pub struct Agent {
    config: Config,
    router: ToolRouter,
    model: Option<Arc<dyn LanguageModel>>,
    initialized: bool,
}

impl Agent {
    /// Build the agent from configuration. Providers are registered here in
    /// deterministic order; connections happen in [`Agent::initialize`].
    pub fn new(config: Config) -> Result<Self> {
        let mut router = ToolRouter::new(config.mcp.routing_strategy);

        for (name, service) in config.ordered_provider_services() {
            if !service.enabled {
                info!("provider '{}' is disabled, skipping", name);
                continue;
            }
            match service.provider_type {
                ProviderType::Local => {
                    let workspace = std::env::current_dir().unwrap_or_else(|_| ".".into());
                    let provider = LocalProvider::new(name.as_str(), builtin_plugins(workspace));
                    router.register(Arc::new(provider), service.priority);
                }
                ProviderType::Cloud => match RemoteProvider::new(name.as_str(), &service) {
                    Ok(provider) => router.register(Arc::new(provider), service.priority),
                    Err(e) => {
                        warn!("provider '{}' misconfigured: {}", name, e);
                    }
                },
            }
        }

        Ok(Agent {
            config,
            router,
            model: None,
            initialized: false,
        })
    }

    /// Connect providers and build the model service. Serving without a
    /// single connected provider is a fatal configuration error; a missing
    /// or broken model service degrades to keyword analysis.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        let connected = self.router.connect_all().await;
        if connected == 0 {
            return Err(Error::Config(
                "no tool providers could be connected".to_string(),
            ));
        }
        info!("{} provider(s) connected", connected);

        if self.config.llm.services.is_empty() {
            warn!("no model services configured; falling back to keyword analysis");
        } else {
            match llm::create_from_config(&self.config.llm) {
                Ok(model) => {
                    info!("model service ready: {}", model.model_name());
                    self.model = Some(model);
                }
                Err(e) => {
                    warn!("model service unavailable ({}); keyword analysis only", e);
                }
            }
        }

        self.initialized = true;
        Ok(())
    }

    /// Whether [`Agent::initialize`] completed
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The model service, when one is configured
    pub fn model(&self) -> Option<Arc<dyn LanguageModel>> {
        self.model.clone()
    }

    /// Install a model service directly, replacing whatever configuration
    /// produced. Useful for custom backends and test harnesses.
    pub fn set_model(&mut self, model: Arc<dyn LanguageModel>) {
        self.model = Some(model);
    }

    /// Aggregated catalog snapshot
    pub async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.router.list_tools().await
    }

    /// Provider status rows for the services listing
    pub async fn service_status(&self) -> Vec<ProviderStatus> {
        self.router.service_status().await
    }

    /// Dispatch a single tool call through the router
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        arguments: serde_json::Value,
    ) -> Result<ResultEnvelope> {
        self.router.call(tool_name, arguments).await
    }

    /// Run the adaptive step loop against a session's history
    pub async fn execute_interactive(
        &self,
        goal: &str,
        history: &mut Vec<HistoryEntry>,
        max_steps: u32,
        auto_continue: bool,
        interaction: &dyn InteractionChannel,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let config = StepLoopConfig::new(max_steps, auto_continue, self.config.security.clone());
        let looped = StepLoop::new(&self.router, self.model.clone(), interaction, cancel);
        looped.run(goal, history, &config).await
    }

    /// One-shot path: plan the next call for a goal and execute it, unless
    /// it is dangerous and the policy requires confirmation first.
    pub async fn execute_plan(&self, goal: &str) -> Result<PlanExecution> {
        let Some(model) = &self.model else {
            return Err(Error::Config("no model service configured".to_string()));
        };

        let catalog = self.router.list_tools().await;
        let calls = model.plan_next(goal, &catalog, &os_tag(), &[]).await?;

        let security = &self.config.security;
        if security.shell_confirm && !security.auto_continue_dangerous {
            let dangerous: Vec<ToolCall> = calls
                .iter()
                .filter(|call| security.dangerous_tools.contains(&call.name))
                .cloned()
                .collect();
            if !dangerous.is_empty() {
                return Ok(PlanExecution::NeedConfirm {
                    dangerous,
                    all: calls,
                });
            }
        }

        let mut results = Vec::new();
        for call in calls {
            let envelope = self
                .router
                .call(&call.name, call.arguments_value())
                .await
                .unwrap_or_else(|e| ResultEnvelope::error(e.to_string()));
            results.push(HistoryEntry::call(call, types::sanitize_envelope(envelope)));
        }
        Ok(PlanExecution::Executed { results })
    }

    /// Execute an already-confirmed batch of calls
    pub async fn execute_confirmed(&self, calls: Vec<ToolCall>) -> Vec<HistoryEntry> {
        let mut results = Vec::new();
        for call in calls {
            let envelope = self
                .router
                .call(&call.name, call.arguments_value())
                .await
                .unwrap_or_else(|e| ResultEnvelope::error(e.to_string()));
            results.push(HistoryEntry::call(call, types::sanitize_envelope(envelope)));
        }
        results
    }

    /// Keyword fallback mapping a goal onto capability tags; used when no
    /// model service is available.
    pub fn analyze_goal(&self, goal: &str) -> Vec<String> {
        let lowered = goal.to_lowercase();
        let mut capabilities = Vec::new();

        let table: [(&str, &[&str]); 5] = [
            ("file", &["file", "folder", "directory", "path", "open", "read", "write"]),
            ("browser", &["browser", "web", "url", "http", "https"]),
            ("process", &["process", "run", "execute", "start", "stop", "kill"]),
            ("mouse", &["mouse", "click", "move", "drag", "scroll"]),
            ("keyboard", &["keyboard", "type", "key", "press", "input"]),
        ];

        for (capability, keywords) in table {
            if keywords.iter().any(|keyword| lowered.contains(keyword)) {
                capabilities.push(capability.to_string());
            }
        }
        capabilities
    }

    /// Route a raw command to one provider by capability set
    pub async fn execute_command(
        &self,
        command: &str,
        required_capabilities: &[String],
    ) -> Result<ResultEnvelope> {
        self.router
            .execute_command(command, required_capabilities)
            .await
    }

    /// Disconnect every provider
    pub async fn close(&self) {
        self.router.disconnect_all().await;
    }
}
