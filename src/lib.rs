//! # toolpilot
//!
//! An LLM-driven tool-execution orchestrator built with Rust.
//!
//! A user submits a natural-language goal; the orchestrator iteratively
//! consults a language model to propose one tool invocation at a time,
//! routes it to a suitable provider (in-process plugins or remote tool
//! servers), feeds the result back, summarizes progress, and optionally
//! pauses for the operator, until the model declares completion or a
//! safety guard trips.
//!
//! ## Architecture
//!
//! - **Agent & step loop** (`agent`): the planner/executor state machine,
//!   repetition guard, confirmation gates, and interaction seam
//! - **Providers** (`providers`): the provider contract, local plugin
//!   provider, remote streamable-session provider, and the router
//! - **Tools** (`tools`): the plugin contract and the built-in leaves
//! - **Model interface** (`llm`): the narrow contract the loop consumes,
//!   with OpenAI-compatible and Anthropic backends
//! - **Context** (`context`): token estimation and history truncation
//! - **Sessions** (`session`): in-memory session registry
//! - **Server** (`server`): the HTTP API surface
//! - **Configuration** (`config`): hierarchical config with validation

// Agent orchestration and the step loop
pub mod agent;

// Modular configuration
pub mod config;

// Token estimation and history truncation
pub mod context;

// Error types
pub mod error;

// Model interface and vendor backends
pub mod llm;

// Logging initialization
pub mod logging;

// Tool providers and the router
pub mod providers;

// HTTP API surface
pub mod server;

// Session registry
pub mod session;

// Built-in tool plugins
pub mod tools;

// Re-export commonly used items
pub use error::{Error, Result};

pub use agent::{Agent, HistoryEntry, RunOutcome, RunStatus};
pub use providers::{EnvelopeStatus, ResultEnvelope, ToolCall, ToolDescriptor};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const NAME: &str = env!("CARGO_PKG_NAME");
