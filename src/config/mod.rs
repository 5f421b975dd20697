//! Configuration module - modular configuration management
//!
//! Split into focused modules:
//! - types.rs: configuration document types (llm, mcp, security, context, logging)
//! - io.rs: configuration loading and saving
//! - validation.rs: startup validation
//! - paths.rs: configuration file paths

mod io;
mod paths;
mod types;
mod validation;

pub use types::{
    Config, ContextConfig, LlmConfig, LlmServiceConfig, LlmServiceType, LoggingConfig, McpConfig,
    ProviderServiceConfig, ProviderType, RoutingStrategy, SecurityConfig,
};

pub use io::{apply_env_overrides, load_config, load_config_from_path, save_config};
pub use paths::{config_dir, config_path, ensure_dir, logs_dir};
pub use validation::{validate_config, ConfigValidationResult, ValidationIssue};
