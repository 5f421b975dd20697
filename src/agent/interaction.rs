//! User-interaction channel
//!
//! The step loop talks to its operator through this seam: dangerous-tool
//! confirmations, streamed summary chunks, and the per-step decision gate.
//! Front-ends implement it over a terminal; the API surface and tests use
//! the non-interactive implementations here.

use async_trait::async_trait;
use serde_json::Value;

/// Operator command at the per-step decision gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserDecision {
    /// Proceed to the next step (the default)
    Continue,
    /// Stop now; run the final summary and return
    Stop,
    /// Replace the goal text; history is preserved
    Edit(String),
    /// Re-plan the next step with unchanged state
    Replan,
    /// Empty the history in place and proceed
    Clear,
}

/// The loop's channel to its operator
#[async_trait]
pub trait InteractionChannel: Send + Sync {
    /// Confirm a dangerous tool before execution. `false` cancels the call.
    async fn confirm_dangerous(&self, tool_name: &str, arguments: &Value) -> bool;

    /// Receive one streamed summary chunk
    async fn on_summary_chunk(&self, chunk: &str);

    /// Read the operator's command after an intermediate summary
    async fn decide(&self) -> UserDecision;

    /// Asked once after the final summary: clear the history for the next
    /// task?
    async fn confirm_clear_history(&self) -> bool;
}

/// Non-interactive channel for API-driven and unattended runs.
///
/// Always continues, never clears, and resolves dangerous-tool prompts with
/// a fixed answer (deny by default: an unattended run has nobody to ask).
pub struct AutoInteraction {
    approve_dangerous: bool,
}

impl AutoInteraction {
    pub fn new() -> Self {
        AutoInteraction {
            approve_dangerous: false,
        }
    }

    pub fn approving_dangerous() -> Self {
        AutoInteraction {
            approve_dangerous: true,
        }
    }
}

impl Default for AutoInteraction {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InteractionChannel for AutoInteraction {
    async fn confirm_dangerous(&self, _tool_name: &str, _arguments: &Value) -> bool {
        self.approve_dangerous
    }

    async fn on_summary_chunk(&self, _chunk: &str) {}

    async fn decide(&self) -> UserDecision {
        UserDecision::Continue
    }

    async fn confirm_clear_history(&self) -> bool {
        false
    }
}

/// Scripted channel used by tests: queued confirmations and decisions,
/// captured summary chunks.
pub struct ScriptedInteraction {
    confirmations: std::sync::Mutex<std::collections::VecDeque<bool>>,
    decisions: std::sync::Mutex<std::collections::VecDeque<UserDecision>>,
    chunks: std::sync::Mutex<String>,
}

impl ScriptedInteraction {
    pub fn new(confirmations: Vec<bool>, decisions: Vec<UserDecision>) -> Self {
        ScriptedInteraction {
            confirmations: std::sync::Mutex::new(confirmations.into()),
            decisions: std::sync::Mutex::new(decisions.into()),
            chunks: std::sync::Mutex::new(String::new()),
        }
    }

    /// Everything streamed through the sink so far
    pub fn streamed(&self) -> String {
        self.chunks.lock().unwrap().clone()
    }
}

#[async_trait]
impl InteractionChannel for ScriptedInteraction {
    async fn confirm_dangerous(&self, _tool_name: &str, _arguments: &Value) -> bool {
        self.confirmations
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(false)
    }

    async fn on_summary_chunk(&self, chunk: &str) {
        self.chunks.lock().unwrap().push_str(chunk);
    }

    async fn decide(&self) -> UserDecision {
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(UserDecision::Continue)
    }

    async fn confirm_clear_history(&self) -> bool {
        false
    }
}
