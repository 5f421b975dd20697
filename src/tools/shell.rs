//! Shell and process tool plugin
//!
//! `execute_shell`, `start_process`, and `kill_process` are the default
//! members of the dangerous-tool set; the step loop gates them behind user
//! confirmation.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::process::Stdio;
use tokio::process::Command;

use super::traits::{required_str, ToolPlugin};
use crate::error::Result;
use crate::providers::{ResultEnvelope, ToolDescriptor};

/// Built-in plugin: shell and process operations
pub struct ShellPlugin;

impl ShellPlugin {
    pub fn new() -> Self {
        ShellPlugin
    }

    fn shell_command(command: &str) -> Command {
        if cfg!(windows) {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        } else {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }

    async fn list_processes(&self) -> ResultEnvelope {
        let output = if cfg!(windows) {
            Command::new("tasklist").args(["/FO", "CSV", "/NH"]).output().await
        } else {
            Command::new("ps").args(["-e", "-o", "pid,comm"]).output().await
        };

        let output = match output {
            Ok(output) => output,
            Err(e) => return ResultEnvelope::error(format!("Failed to list processes: {}", e)),
        };
        if !output.status.success() {
            return ResultEnvelope::error(format!(
                "Failed to list processes: {}",
                String::from_utf8_lossy(&output.stderr)
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let processes = if cfg!(windows) {
            parse_tasklist_csv(&stdout)
        } else {
            parse_ps_output(&stdout)
        };

        let rows: Vec<Value> = processes
            .into_iter()
            .map(|(pid, name)| json!({"pid": pid, "name": name}))
            .collect();
        ResultEnvelope::success(json!({"processes": rows}))
    }

    /// Terminate a process: polite signal first, force after a grace
    /// period (`taskkill /F` on Windows does both at once).
    async fn kill_process(&self, pid: i64) -> ResultEnvelope {
        if cfg!(windows) {
            let output = Command::new("taskkill")
                .args(["/F", "/PID", &pid.to_string()])
                .output()
                .await;
            return match output {
                Ok(output) if output.status.success() => {
                    ResultEnvelope::success(json!({"pid": pid}))
                }
                Ok(output) => ResultEnvelope::error(format!(
                    "Process {} not found: {}",
                    pid,
                    String::from_utf8_lossy(&output.stderr)
                )),
                Err(e) => ResultEnvelope::error(format!("Failed to kill process {}: {}", pid, e)),
            };
        }

        let pid_arg = pid.to_string();
        let term = Command::new("kill").args(["-TERM", &pid_arg]).output().await;
        match term {
            Ok(output) if !output.status.success() => {
                return ResultEnvelope::error(format!("Process {} not found", pid));
            }
            Err(e) => {
                return ResultEnvelope::error(format!("Failed to kill process {}: {}", pid, e));
            }
            Ok(_) => {}
        }

        // Grace period: poll for exit, then escalate.
        for _ in 0..10 {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            let alive = Command::new("kill")
                .args(["-0", &pid_arg])
                .output()
                .await
                .map(|output| output.status.success())
                .unwrap_or(false);
            if !alive {
                return ResultEnvelope::success(json!({"pid": pid}));
            }
        }

        match Command::new("kill").args(["-KILL", &pid_arg]).output().await {
            Ok(_) => ResultEnvelope::success(json!({"pid": pid, "forced": true})),
            Err(e) => ResultEnvelope::error(format!("Failed to kill process {}: {}", pid, e)),
        }
    }
}

/// Parse `ps -e -o pid,comm` output, skipping the header line
fn parse_ps_output(stdout: &str) -> Vec<(i64, String)> {
    stdout
        .trim()
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.trim().splitn(2, char::is_whitespace);
            let pid: i64 = parts.next()?.trim().parse().ok()?;
            let name = parts.next()?.trim().to_string();
            Some((pid, name))
        })
        .collect()
}

/// Parse `tasklist /FO CSV /NH` output: `"name","pid",...` per line
fn parse_tasklist_csv(stdout: &str) -> Vec<(i64, String)> {
    stdout
        .trim()
        .lines()
        .filter_map(|line| {
            let line = line.trim().trim_matches('"');
            let mut parts = line.split("\",\"");
            let name = parts.next()?.to_string();
            let pid: i64 = parts.next()?.parse().ok()?;
            Some((pid, name))
        })
        .collect()
}

impl Default for ShellPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolPlugin for ShellPlugin {
    fn capabilities(&self) -> Vec<String> {
        vec!["process".to_string(), "shell".to_string()]
    }

    fn tools(&self) -> Vec<ToolDescriptor> {
        vec![
            ToolDescriptor::new(
                "execute_shell",
                "Run a shell command and wait for it to finish",
                json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "Command line to run"
                        },
                        "timeout_seconds": {
                            "type": "integer",
                            "description": "Kill the command after this many seconds (default 60)"
                        }
                    },
                    "required": ["command"]
                }),
            ),
            ToolDescriptor::new(
                "start_process",
                "Start a long-running process without waiting for it",
                json!({
                    "type": "object",
                    "properties": {
                        "command": {
                            "type": "string",
                            "description": "Executable to start"
                        },
                        "args": {
                            "type": "array",
                            "items": {"type": "string"},
                            "description": "Arguments for the executable"
                        }
                    },
                    "required": ["command"]
                }),
            ),
            ToolDescriptor::new(
                "list_processes",
                "List running processes with their pids",
                json!({
                    "type": "object",
                    "properties": {}
                }),
            ),
            ToolDescriptor::new(
                "kill_process",
                "Terminate a process by pid, forcing it after a grace period",
                json!({
                    "type": "object",
                    "properties": {
                        "pid": {
                            "type": "integer",
                            "description": "Process id to terminate"
                        }
                    },
                    "required": ["pid"]
                }),
            ),
        ]
    }

    async fn call(&self, name: &str, arguments: Value) -> Result<ResultEnvelope> {
        match name {
            "execute_shell" => {
                let command = required_str(&arguments, "command")?;
                let timeout_seconds = arguments
                    .get("timeout_seconds")
                    .and_then(Value::as_u64)
                    .unwrap_or(60);

                let output = tokio::time::timeout(
                    std::time::Duration::from_secs(timeout_seconds),
                    Self::shell_command(command).output(),
                )
                .await;

                match output {
                    Ok(Ok(output)) => {
                        let code = output.status.code().unwrap_or(-1);
                        let envelope = ResultEnvelope::from_value(json!({
                            "status": if output.status.success() { "success" } else { "error" },
                            "returncode": code,
                            "stdout": String::from_utf8_lossy(&output.stdout),
                            "stderr": String::from_utf8_lossy(&output.stderr),
                        }));
                        Ok(envelope)
                    }
                    Ok(Err(e)) => Ok(ResultEnvelope::error(format!(
                        "Failed to run command: {}",
                        e
                    ))),
                    Err(_) => Ok(ResultEnvelope::error(format!(
                        "Command timed out after {}s",
                        timeout_seconds
                    ))),
                }
            }
            "start_process" => {
                let command = required_str(&arguments, "command")?;
                let args: Vec<String> = arguments
                    .get("args")
                    .and_then(Value::as_array)
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default();

                match Command::new(command)
                    .args(&args)
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .spawn()
                {
                    Ok(child) => Ok(ResultEnvelope::success(json!({
                        "pid": child.id(),
                        "command": command,
                    }))),
                    Err(e) => Ok(ResultEnvelope::error(format!(
                        "Failed to start process: {}",
                        e
                    ))),
                }
            }
            "list_processes" => Ok(self.list_processes().await),
            "kill_process" => {
                let pid = arguments
                    .get("pid")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| {
                        crate::Error::InvalidInput("Missing 'pid' parameter".to_string())
                    })?;
                Ok(self.kill_process(pid).await)
            }
            other => Ok(ResultEnvelope::error(format!("Unknown tool: {}", other))),
        }
    }
}
