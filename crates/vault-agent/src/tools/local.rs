//! Tools for the degraded backend
//!
//! Same surface as the remote tool set minus `computer`, executed against
//! the local host. Vault writes are pushed through the sync collaborator
//! immediately so no degraded-mode work is stranded locally.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::warn;

use super::{
    truncate_output, Observation, ParameterProperty, ParameterSchema, Tool, ToolContext,
};
use crate::sync::GitSync;

/// Expand a leading `~/` against the home directory.
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Shell execution on the local host.
pub struct LocalBashTool;

#[async_trait]
impl Tool for LocalBashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command. Use for file operations, git, system tasks."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "command",
            ParameterProperty::string("The bash command to execute"),
        )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<Observation> {
        let command = args.get("command").and_then(|v| v.as_str()).unwrap_or("");

        let mut cmd = Command::new("bash");
        cmd.arg("-c")
            .arg(command)
            .current_dir(&ctx.vault_root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let result = timeout(Duration::from_secs(ctx.command_timeout_secs), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let exit_code = output.status.code().unwrap_or(-1);
                Ok(Observation::text(format!(
                    "Exit code: {}\nOutput: {}\nErrors: {}",
                    exit_code,
                    truncate_output(&stdout, ctx.shell_output_cap),
                    truncate_output(&stderr, 500)
                )))
            }
            Ok(Err(e)) => Ok(Observation::text(format!("Error: {}", e))),
            Err(_) => Ok(Observation::text(format!(
                "Command timed out after {} seconds",
                ctx.command_timeout_secs
            ))),
        }
    }
}

/// File read on the local host, capped.
pub struct LocalReadFileTool;

#[async_trait]
impl Tool for LocalReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read contents of a file."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("path", ParameterProperty::string("Path to the file"))
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<Observation> {
        let path_str = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let path = expand_home(path_str);

        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Observation::text(truncate_output(
                &content,
                ctx.read_byte_cap,
            ))),
            Err(e) => Ok(Observation::text(format!(
                "Error reading file: {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// File write on the local host. Writes under the vault root are pushed to
/// the sync collaborator immediately.
pub struct LocalWriteFileTool {
    sync: Arc<GitSync>,
}

impl LocalWriteFileTool {
    pub fn new(sync: Arc<GitSync>) -> Self {
        Self { sync }
    }
}

#[async_trait]
impl Tool for LocalWriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required("path", ParameterProperty::string("Path to write to"))
            .with_required("content", ParameterProperty::string("Content to write"))
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<Observation> {
        let path_str = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");
        let path = expand_home(path_str);

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                return Ok(Observation::text(format!("Error writing: {}", e)));
            }
        }

        if let Err(e) = std::fs::write(&path, content) {
            return Ok(Observation::text(format!("Error writing: {}", e)));
        }

        if path.starts_with(&ctx.vault_root) {
            if let Err(e) = self.sync.push().await {
                warn!(error = %e, "Vault push after write failed");
            }
            return Ok(Observation::text(format!(
                "Successfully wrote to {} (synced)",
                path.display()
            )));
        }

        Ok(Observation::text(format!(
            "Successfully wrote to {}",
            path.display()
        )))
    }
}

/// Browser automation on the local host, run with a visible display.
pub struct LocalBrowserTool;

#[async_trait]
impl Tool for LocalBrowserTool {
    fn name(&self) -> &str {
        "browser_use"
    }

    fn description(&self) -> &str {
        "Use browser for web tasks (searching, booking, form filling)."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "instruction",
            ParameterProperty::string("What to do in the browser"),
        )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<Observation> {
        let instruction = args
            .get("instruction")
            .and_then(|v| v.as_str())
            .unwrap_or("");

        let script = super::remote::browser_script(instruction);

        let mut cmd = Command::new("python3");
        cmd.arg("-c")
            .arg(&script)
            .env("DISPLAY", ":0")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let result = timeout(Duration::from_secs(ctx.browser_timeout_secs), cmd.output()).await;

        match result {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                let text = if !stdout.trim().is_empty() {
                    truncate_output(&stdout, ctx.browser_output_cap)
                } else if !stderr.trim().is_empty() {
                    truncate_output(&stderr, 1000)
                } else {
                    "Browser task completed".to_string()
                };
                Ok(Observation::text(text))
            }
            Ok(Err(e)) => Ok(Observation::text(format!("Browser error: {}", e))),
            Err(_) => Ok(Observation::text(format!(
                "Browser task timed out after {} seconds",
                ctx.browser_timeout_secs
            ))),
        }
    }
}
