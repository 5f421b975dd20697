//! Configuration types
//!
//! The configuration document is hierarchical: `llm` (model services),
//! `mcp` (tool providers and routing), `security` (confirmation policy),
//! `context` (loop limits), and `logging`.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Language model services
    #[serde(default)]
    pub llm: LlmConfig,

    /// Tool provider services and routing
    #[serde(default)]
    pub mcp: McpConfig,

    /// Security / confirmation policy
    #[serde(default)]
    pub security: SecurityConfig,

    /// Step-loop context limits
    #[serde(default)]
    pub context: ContextConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Language model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the default service in `services`
    #[serde(default = "default_llm_service")]
    pub default: String,

    /// Named model services
    #[serde(default)]
    pub services: HashMap<String, LlmServiceConfig>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig {
            default: default_llm_service(),
            services: HashMap::new(),
        }
    }
}

fn default_llm_service() -> String {
    "openai".to_string()
}

/// Kind of language model backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmServiceType {
    /// OpenAI chat-completions API
    Openai,
    /// Anthropic messages API
    Anthropic,
    /// OpenAI-compatible local server (ollama, llama.cpp, vllm, ...)
    Local,
}

/// A single model service entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmServiceConfig {
    /// Backend kind
    #[serde(rename = "type")]
    pub service_type: LlmServiceType,

    /// API key (absent for local servers)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Override the vendor base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model identifier
    pub model: String,

    /// Model context window used by history truncation
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Per-request timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    120
}

/// Strategy used when routing a capability-level request to one provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingStrategy {
    /// Prefer the provider whose capability set covers the request
    #[default]
    CapabilityMatch,
    /// Highest-priority available provider
    PriorityFirst,
    /// Uniform random among available providers
    LoadBalance,
}

/// Tool provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McpConfig {
    /// Provider selection strategy for capability-level routing
    #[serde(default)]
    pub routing_strategy: RoutingStrategy,

    /// Named provider services
    #[serde(default)]
    pub services: HashMap<String, ProviderServiceConfig>,
}

/// Kind of tool provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// In-process plugin provider
    Local,
    /// Remote streamable tool server
    Cloud,
}

/// A single provider service entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderServiceConfig {
    /// Provider kind
    #[serde(rename = "type")]
    pub provider_type: ProviderType,

    /// Disabled services are skipped at startup
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Routing priority (higher wins; ties broken by registration order)
    #[serde(default)]
    pub priority: i32,

    /// Remote endpoint URL (cloud only)
    #[serde(default)]
    pub url: Option<String>,

    /// Bearer token for the remote endpoint
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Static capability tags (local providers compute their own)
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Per-stage timeout for handshake, catalog fetch, and calls
    #[serde(default = "default_provider_timeout")]
    pub timeout_seconds: u64,

    /// Connection attempts before giving up
    #[serde(default = "default_connect_retries")]
    pub connect_retries: u32,

    /// Attempts per tool call before surfacing the error
    #[serde(default = "default_call_retries")]
    pub call_retries: u32,

    /// Delay between tool-call attempts
    #[serde(default = "default_call_retry_delay")]
    pub call_retry_delay_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_provider_timeout() -> u64 {
    30
}

fn default_connect_retries() -> u32 {
    2
}

fn default_call_retries() -> u32 {
    2
}

fn default_call_retry_delay() -> u64 {
    500
}

impl Default for ProviderServiceConfig {
    fn default() -> Self {
        ProviderServiceConfig {
            provider_type: ProviderType::Local,
            enabled: true,
            priority: 0,
            url: None,
            api_key: None,
            capabilities: Vec::new(),
            timeout_seconds: default_provider_timeout(),
            connect_retries: default_connect_retries(),
            call_retries: default_call_retries(),
            call_retry_delay_ms: default_call_retry_delay(),
        }
    }
}

/// Security / confirmation policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Require confirmation before running tools from `dangerous_tools`
    #[serde(default = "default_true")]
    pub shell_confirm: bool,

    /// Skip the confirmation prompt even for dangerous tools
    #[serde(default)]
    pub auto_continue_dangerous: bool,

    /// Skip the per-step user decision gate
    #[serde(default)]
    pub auto_continue_interactive: bool,

    /// Tools that require confirmation
    #[serde(default = "default_dangerous_tools")]
    pub dangerous_tools: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            shell_confirm: true,
            auto_continue_dangerous: false,
            auto_continue_interactive: false,
            dangerous_tools: default_dangerous_tools(),
        }
    }
}

fn default_dangerous_tools() -> Vec<String> {
    vec![
        "execute_shell".to_string(),
        "start_process".to_string(),
        "kill_process".to_string(),
    ]
}

/// Step-loop context limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Maximum step-loop rounds per request
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
}

impl Default for ContextConfig {
    fn default() -> Self {
        ContextConfig {
            max_rounds: default_max_rounds(),
        }
    }
}

fn default_max_rounds() -> u32 {
    10
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace/debug/info/warn/error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path; stderr when absent
    #[serde(default)]
    pub file: Option<std::path::PathBuf>,

    /// Rotate when the file exceeds this many bytes (0 disables)
    #[serde(default)]
    pub max_size: u64,

    /// Rotated files to keep
    #[serde(default = "default_backup_count")]
    pub backup_count: u32,

    /// Output format: "plain" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            file: None,
            max_size: 0,
            backup_count: default_backup_count(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backup_count() -> u32 {
    3
}

fn default_log_format() -> String {
    "plain".to_string()
}

impl Config {
    /// Provider services in deterministic registration order:
    /// priority descending, then name ascending.
    pub fn ordered_provider_services(&self) -> Vec<(String, ProviderServiceConfig)> {
        let mut services: Vec<_> = self
            .mcp
            .services
            .iter()
            .map(|(name, cfg)| (name.clone(), cfg.clone()))
            .collect();
        services.sort_by(|a, b| b.1.priority.cmp(&a.1.priority).then(a.0.cmp(&b.0)));
        services
    }

    /// The configured default model service, if present
    pub fn default_llm_service(&self) -> Option<&LlmServiceConfig> {
        self.llm.services.get(&self.llm.default)
    }
}
