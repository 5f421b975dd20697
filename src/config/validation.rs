//! Configuration validation
//!
//! Validates configuration and reports issues before the process starts
//! serving requests.

use super::types::{Config, LlmServiceType, ProviderType};

/// Result of configuration validation
#[derive(Debug, Clone)]
pub struct ConfigValidationResult {
    /// Whether the config is valid
    pub valid: bool,
    /// Validation errors (critical)
    pub errors: Vec<ValidationIssue>,
    /// Validation warnings (non-critical)
    pub warnings: Vec<ValidationIssue>,
}

impl ConfigValidationResult {
    /// Create a valid result
    pub fn valid() -> Self {
        ConfigValidationResult {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Add an error
    pub fn with_error(mut self, issue: ValidationIssue) -> Self {
        self.valid = false;
        self.errors.push(issue);
        self
    }

    /// Add a warning
    pub fn with_warning(mut self, issue: ValidationIssue) -> Self {
        self.warnings.push(issue);
        self
    }
}

/// A validation issue
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    /// Path to the config field
    pub path: String,
    /// Issue message
    pub message: String,
}

impl ValidationIssue {
    /// Create a new issue
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        ValidationIssue {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> ConfigValidationResult {
    let mut result = ConfigValidationResult::valid();

    let enabled_providers = config
        .mcp
        .services
        .values()
        .filter(|s| s.enabled)
        .count();
    if enabled_providers == 0 {
        result = result.with_error(ValidationIssue::new(
            "mcp.services",
            "no enabled tool providers; the orchestrator cannot dispatch any calls",
        ));
    }

    for (name, service) in &config.mcp.services {
        if service.provider_type == ProviderType::Cloud && service.url.is_none() {
            result = result.with_error(ValidationIssue::new(
                format!("mcp.services.{}.url", name),
                "cloud providers require a url",
            ));
        }
    }

    if config.llm.services.is_empty() {
        result = result.with_warning(ValidationIssue::new(
            "llm.services",
            "no model services configured; goal planning will fall back to keyword analysis",
        ));
    } else if !config.llm.services.contains_key(&config.llm.default) {
        result = result.with_error(ValidationIssue::new(
            "llm.default",
            format!("default service '{}' is not defined", config.llm.default),
        ));
    }

    for (name, service) in &config.llm.services {
        let needs_key = matches!(
            service.service_type,
            LlmServiceType::Openai | LlmServiceType::Anthropic
        );
        if needs_key && service.api_key.is_none() {
            result = result.with_error(ValidationIssue::new(
                format!("llm.services.{}.api_key", name),
                "missing API key (config file or environment)",
            ));
        }
        if service.model.is_empty() {
            result = result.with_error(ValidationIssue::new(
                format!("llm.services.{}.model", name),
                "model must not be empty",
            ));
        }
    }

    if config.security.dangerous_tools.is_empty() && config.security.shell_confirm {
        result = result.with_warning(ValidationIssue::new(
            "security.dangerous_tools",
            "shell_confirm is set but the dangerous tool list is empty",
        ));
    }

    if config.context.max_rounds == 0 {
        result = result.with_error(ValidationIssue::new(
            "context.max_rounds",
            "must be at least 1",
        ));
    }

    result
}
