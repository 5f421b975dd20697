//! File-system tool plugin
//!
//! Directory listing and file read/write/delete, confined to an allowed
//! root directory.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

use super::traits::{required_str, ToolPlugin};
use crate::error::Result;
use crate::providers::{ResultEnvelope, ToolDescriptor};

/// Built-in plugin: file operations
pub struct FsPlugin {
    allowed_dir: PathBuf,
}

impl FsPlugin {
    pub fn new(allowed_dir: PathBuf) -> Self {
        FsPlugin { allowed_dir }
    }

    /// Resolve a tool path against the allowed root, rejecting escapes.
    fn resolve(&self, path: &str) -> std::result::Result<PathBuf, ResultEnvelope> {
        let joined = self.allowed_dir.join(path);
        let normalized = normalize(&joined);
        if !normalized.starts_with(normalize(&self.allowed_dir)) {
            return Err(ResultEnvelope::error(
                "Access denied: path outside workspace",
            ));
        }
        Ok(normalized)
    }
}

/// Lexically normalize a path (resolve `.` and `..` without touching the fs)
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                out.pop();
            }
            std::path::Component::CurDir => {}
            other => out.push(other),
        }
    }
    out
}

#[async_trait]
impl ToolPlugin for FsPlugin {
    fn capabilities(&self) -> Vec<String> {
        vec!["file".to_string()]
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "list_directory",
                "List the entries of a directory",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Directory path (relative to the workspace)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            ToolDescriptor::new(
                "read_file",
                "Read the contents of a file",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File path (relative to the workspace)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
            ToolDescriptor::new(
                "write_file",
                "Write text content to a file, creating parent directories",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "File path (relative to the workspace)"
                        },
                        "content": {
                            "type": "string",
                            "description": "Text content to write"
                        }
                    },
                    "required": ["path", "content"]
                }),
            ),
            ToolDescriptor::new(
                "delete_path",
                "Delete a file or an empty directory",
                json!({
                    "type": "object",
                    "properties": {
                        "path": {
                            "type": "string",
                            "description": "Path to delete (relative to the workspace)"
                        }
                    },
                    "required": ["path"]
                }),
            ),
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope> {
        let path = required_str(&arguments, "path")?;
        let full_path = match self.resolve(path) {
            Ok(p) => p,
            Err(denied) => return Ok(denied),
        };

        match name {
            "list_directory" => {
                let mut read_dir = match tokio::fs::read_dir(&full_path).await {
                    Ok(rd) => rd,
                    Err(e) => {
                        return Ok(ResultEnvelope::error(format!(
                            "Failed to list directory: {}",
                            e
                        )))
                    }
                };
                let mut entries = Vec::new();
                while let Ok(Some(entry)) = read_dir.next_entry().await {
                    let file_type = entry.file_type().await.ok();
                    entries.push(json!({
                        "name": entry.file_name().to_string_lossy(),
                        "is_dir": file_type.map(|t| t.is_dir()).unwrap_or(false),
                    }));
                }
                Ok(ResultEnvelope::success(json!({"entries": entries})))
            }
            "read_file" => match tokio::fs::read_to_string(&full_path).await {
                Ok(content) => Ok(ResultEnvelope::success(content)),
                Err(e) => Ok(ResultEnvelope::error(format!("Failed to read file: {}", e))),
            },
            "write_file" => {
                let content = required_str(&arguments, "content")?;
                if let Some(parent) = full_path.parent() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        return Ok(ResultEnvelope::error(format!(
                            "Failed to create parent directory: {}",
                            e
                        )));
                    }
                }
                match tokio::fs::write(&full_path, content).await {
                    Ok(()) => Ok(ResultEnvelope::success(json!({
                        "written": content.len(),
                        "path": full_path.to_string_lossy(),
                    }))),
                    Err(e) => Ok(ResultEnvelope::error(format!("Failed to write file: {}", e))),
                }
            }
            "delete_path" => {
                let meta = match tokio::fs::metadata(&full_path).await {
                    Ok(m) => m,
                    Err(e) => {
                        return Ok(ResultEnvelope::error(format!("Failed to delete: {}", e)))
                    }
                };
                let outcome = if meta.is_dir() {
                    tokio::fs::remove_dir(&full_path).await
                } else {
                    tokio::fs::remove_file(&full_path).await
                };
                match outcome {
                    Ok(()) => Ok(ResultEnvelope::success(json!({
                        "deleted": full_path.to_string_lossy()
                    }))),
                    Err(e) => Ok(ResultEnvelope::error(format!("Failed to delete: {}", e))),
                }
            }
            other => Ok(ResultEnvelope::error(format!("Unknown tool: {}", other))),
        }
    }
}
