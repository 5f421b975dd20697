//! Model interface
//!
//! The narrow contract the step loop consumes: primitive completion
//! (blocking and streamed) plus the three provided operations built on top
//! of it: next-call planning, intermediate summary, and final summary.
//! Backends implement only the primitives.
//!
//! - **openai**: OpenAI-compatible chat completions (also local servers)
//! - **anthropic**: Anthropic messages API
//! - **prompts**: Handlebars templates
//! - **parse**: tolerant planning-output parsing

mod anthropic;
mod openai;
pub mod parse;
pub mod prompts;

pub use anthropic::AnthropicBackend;
pub use openai::OpenAiBackend;

use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;
use tracing::debug;

use crate::agent::types::HistoryEntry;
use crate::config::{LlmConfig, LlmServiceType};
use crate::context::{truncate_history, DEFAULT_RESERVED_TOKENS};
use crate::error::{Error, Result};
use crate::providers::{ToolCall, ToolDescriptor};

/// A finite, non-restartable sequence of streamed text fragments
pub type TextStream = BoxStream<'static, Result<String>>;

/// The language-model contract the loop depends on
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier for logging
    fn model_name(&self) -> &str;

    /// Context window in tokens, used for history truncation
    fn context_window(&self) -> usize;

    /// Primitive blocking completion
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Primitive streamed completion
    async fn generate_stream(&self, prompt: &str) -> Result<TextStream>;

    /// Produce the next tool call for a goal: zero or one calls.
    ///
    /// Unparseable model output means "no tool call".
    async fn plan_next(
        &self,
        goal: &str,
        catalog: &[ToolDescriptor],
        os_tag: &str,
        history: &[HistoryEntry],
    ) -> Result<Vec<ToolCall>> {
        let (truncated, was_truncated) =
            truncate_history(history, self.context_window(), DEFAULT_RESERVED_TOKENS);
        if was_truncated {
            debug!("history truncated before planning");
        }

        let prompt = prompts::planning_prompt(goal, catalog, os_tag, &truncated)?;
        let response = self.generate(&prompt).await?;
        debug!("planning response: {}", &response[..response.len().min(500)]);

        let mut calls = parse::parse_tool_calls(&response);
        calls.truncate(1);
        Ok(calls)
    }

    /// Stream an intermediate summary of progress so far
    async fn intermediate_summary(&self, goal: &str, history: &[HistoryEntry]) -> Result<TextStream> {
        let (truncated, _) =
            truncate_history(history, self.context_window(), DEFAULT_RESERVED_TOKENS);
        let prompt = prompts::intermediate_summary_prompt(goal, &truncated)?;
        self.generate_stream(&prompt).await
    }

    /// Stream the final whole-run summary
    async fn final_summary(&self, goal: &str, history: &[HistoryEntry]) -> Result<TextStream> {
        let (truncated, _) =
            truncate_history(history, self.context_window(), DEFAULT_RESERVED_TOKENS);
        let prompt = prompts::final_summary_prompt(goal, &truncated)?;
        self.generate_stream(&prompt).await
    }
}

/// Build the default model service from configuration
pub fn create_from_config(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let service = config.services.get(&config.default).ok_or_else(|| {
        Error::Config(format!(
            "default llm service '{}' is not configured",
            config.default
        ))
    })?;

    match service.service_type {
        LlmServiceType::Openai | LlmServiceType::Local => {
            Ok(Arc::new(OpenAiBackend::new(service)?))
        }
        LlmServiceType::Anthropic => Ok(Arc::new(AnthropicBackend::new(service)?)),
    }
}
