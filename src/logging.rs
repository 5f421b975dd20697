//! Logging initialization
//!
//! Builds the tracing subscriber from the `logging` configuration section.

use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{Error, Result};

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set, otherwise uses the configured level. When a
/// file is configured the output goes there instead of stderr. Returns an
/// error if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let json = config.format.eq_ignore_ascii_case("json");

    match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            rotate_if_needed(path, config)?;
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false);
            if json {
                builder
                    .json()
                    .try_init()
                    .map_err(|e| Error::Internal(format!("Failed to init logging: {}", e)))?;
            } else {
                builder
                    .try_init()
                    .map_err(|e| Error::Internal(format!("Failed to init logging: {}", e)))?;
            }
        }
        None => {
            let builder = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr);
            if json {
                builder
                    .json()
                    .try_init()
                    .map_err(|e| Error::Internal(format!("Failed to init logging: {}", e)))?;
            } else {
                builder
                    .try_init()
                    .map_err(|e| Error::Internal(format!("Failed to init logging: {}", e)))?;
            }
        }
    }

    Ok(())
}

/// Size-based rotation: shift `file` -> `file.1` -> ... -> `file.N`.
fn rotate_if_needed(path: &std::path::Path, config: &LoggingConfig) -> Result<()> {
    if config.max_size == 0 {
        return Ok(());
    }
    let Ok(meta) = std::fs::metadata(path) else {
        return Ok(());
    };
    if meta.len() < config.max_size {
        return Ok(());
    }

    for index in (1..config.backup_count).rev() {
        let from = rotated_name(path, index);
        let to = rotated_name(path, index + 1);
        if from.exists() {
            std::fs::rename(&from, &to)?;
        }
    }
    if config.backup_count > 0 {
        std::fs::rename(path, rotated_name(path, 1))?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

fn rotated_name(path: &std::path::Path, index: u32) -> std::path::PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(format!(".{}", index));
    std::path::PathBuf::from(name)
}
