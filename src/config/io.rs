//! Configuration I/O - loading and saving configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use secrecy::SecretString;

use super::types::Config;
use crate::error::{Error, Result};

/// Load configuration from the default path, falling back to the environment
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    if config_path.exists() {
        let mut config = load_config_from_path(&config_path)?;
        apply_env_overrides(&mut config);
        Ok(config)
    } else {
        let mut config = Config::default();
        apply_env_overrides(&mut config);
        Ok(config)
    }
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment-variable overrides for secrets and endpoints
///
/// Fills in `api_key` fields that the config file leaves empty so keys can
/// stay out of checked-in configuration.
pub fn apply_env_overrides(config: &mut Config) {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    for (name, service) in config.llm.services.iter_mut() {
        if service.api_key.is_none() {
            let candidates = [
                format!("TOOLPILOT_{}_API_KEY", name.to_uppercase()),
                match service.service_type {
                    super::types::LlmServiceType::Openai => "OPENAI_API_KEY".to_string(),
                    super::types::LlmServiceType::Anthropic => "ANTHROPIC_API_KEY".to_string(),
                    super::types::LlmServiceType::Local => String::new(),
                },
            ];
            for var in candidates.iter().filter(|v| !v.is_empty()) {
                if let Ok(key) = std::env::var(var) {
                    service.api_key = Some(SecretString::from(key));
                    break;
                }
            }
        }
    }

    for (name, service) in config.mcp.services.iter_mut() {
        if service.api_key.is_none() {
            let var = format!("TOOLPILOT_MCP_{}_API_KEY", name.to_uppercase());
            if let Ok(key) = std::env::var(&var) {
                service.api_key = Some(SecretString::from(key));
            }
        }
    }

    if let Ok(level) = std::env::var("TOOLPILOT_LOG_LEVEL") {
        config.logging.level = level;
    }
}

/// Save configuration to a file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = if path.extension().map_or(false, |ext| ext == "toml") {
        toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    } else {
        serde_json::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, content)?;
    Ok(())
}
