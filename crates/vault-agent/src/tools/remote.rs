//! Tools for the full-capability backend
//!
//! Every side effect goes through the remote desktop endpoint. File
//! operations are built from the remote shell primitive rather than a
//! dedicated file API.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use agent_core::{RemoteClient, RemoteResponse, ScreenshotResolver};

use super::{
    truncate_output, Observation, ParameterProperty, ParameterSchema, Tool, ToolContext,
};

fn shell_observation(response: &RemoteResponse, cap: usize) -> Observation {
    match response {
        RemoteResponse::Json(_) => {
            let output = response.field_str("output").unwrap_or_default();
            let exit_code = response.field_i64("exit_code").unwrap_or(-1);
            Observation::text(format!(
                "Exit code: {}\nOutput: {}",
                exit_code,
                truncate_output(output, cap)
            ))
        }
        RemoteResponse::Error(body) => Observation::text(format!("Remote error: {}", body)),
    }
}

/// Computer control: screenshots and GUI input on the remote desktop.
pub struct ComputerTool {
    remote: Arc<RemoteClient>,
    resolver: Arc<ScreenshotResolver>,
}

impl ComputerTool {
    pub fn new(remote: Arc<RemoteClient>, resolver: Arc<ScreenshotResolver>) -> Self {
        Self { remote, resolver }
    }
}

#[async_trait]
impl Tool for ComputerTool {
    fn name(&self) -> &str {
        "computer"
    }

    fn description(&self) -> &str {
        "Control the computer: take screenshots, click, type, scroll, press keys."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .with_required(
                "action",
                ParameterProperty::string("The action to perform")
                    .with_enum(&["screenshot", "click", "type", "key", "scroll"]),
            )
            .with_property("x", ParameterProperty::integer("X coordinate for click/scroll"))
            .with_property("y", ParameterProperty::integer("Y coordinate for click/scroll"))
            .with_property("text", ParameterProperty::string("Text to type"))
            .with_property(
                "key",
                ParameterProperty::string("Key to press (Return, Escape, Tab, etc.)"),
            )
            .with_property(
                "button",
                ParameterProperty::string("Mouse button").with_enum(&["left", "right", "middle"]),
            )
            .with_property(
                "direction",
                ParameterProperty::string("Scroll direction").with_enum(&["up", "down"]),
            )
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<Observation> {
        let action = args.get("action").and_then(|v| v.as_str()).unwrap_or("");

        match action {
            "screenshot" => match self.resolver.capture(true).await {
                Some(transport) => Ok(Observation::Image(transport)),
                None => Ok(Observation::text("Failed to take screenshot")),
            },
            "click" => {
                let x = args.get("x").and_then(|v| v.as_i64()).unwrap_or(0);
                let y = args.get("y").and_then(|v| v.as_i64()).unwrap_or(0);
                let button = args.get("button").and_then(|v| v.as_str()).unwrap_or("left");
                self.remote.click(x, y, button).await;
                Ok(Observation::text(format!(
                    "Clicked at ({}, {}) with {} button",
                    x, y, button
                )))
            }
            "type" => {
                let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("");
                self.remote.type_text(text).await;
                let preview: String = text.chars().take(50).collect();
                Ok(Observation::text(format!("Typed: {}...", preview)))
            }
            "key" => {
                let key = args.get("key").and_then(|v| v.as_str()).unwrap_or("Return");
                self.remote.key(key).await;
                Ok(Observation::text(format!("Pressed key: {}", key)))
            }
            "scroll" => {
                let x = args.get("x").and_then(|v| v.as_i64()).unwrap_or(500);
                let y = args.get("y").and_then(|v| v.as_i64()).unwrap_or(500);
                let direction = args
                    .get("direction")
                    .and_then(|v| v.as_str())
                    .unwrap_or("down");
                let amount = args.get("amount").and_then(|v| v.as_i64()).unwrap_or(3);
                self.remote.scroll(x, y, direction, amount).await;
                Ok(Observation::text(format!(
                    "Scrolled {} at ({}, {})",
                    direction, x, y
                )))
            }
            other => Ok(Observation::text(format!(
                "Unknown computer action: {}",
                other
            ))),
        }
    }
}

/// Shell execution on the remote host.
pub struct RemoteBashTool {
    remote: Arc<RemoteClient>,
}

impl RemoteBashTool {
    pub fn new(remote: Arc<RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Tool for RemoteBashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Execute a bash command on the computer."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "command",
            ParameterProperty::string("The bash command to execute"),
        )
    }

    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<Observation> {
        let command = args.get("command").and_then(|v| v.as_str()).unwrap_or("");
        let response = self.remote.bash(command).await;
        Ok(shell_observation(&response, ctx.shell_output_cap))
    }
}

/// File read via the remote shell (`cat`), capped.
pub struct RemoteReadFileTool {
    remote: Arc<RemoteClient>,
}

impl RemoteReadFileTool {
    pub fn new(remote: Arc<RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Tool for RemoteReadFileTool {
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
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let response = self.remote.bash(&format!("cat '{}'", path)).await;

        match &response {
            RemoteResponse::Json(_) => {
                let output = response.field_str("output").unwrap_or_default();
                Ok(Observation::text(truncate_output(output, ctx.read_byte_cap)))
            }
            RemoteResponse::Error(body) => Ok(Observation::text(format!(
                "Error reading {}: {}",
                path, body
            ))),
        }
    }
}

/// File write via the remote shell (heredoc), creating parent directories.
pub struct RemoteWriteFileTool {
    remote: Arc<RemoteClient>,
}

impl RemoteWriteFileTool {
    pub fn new(remote: Arc<RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Tool for RemoteWriteFileTool {
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

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<Observation> {
        let path = args.get("path").and_then(|v| v.as_str()).unwrap_or("");
        let content = args.get("content").and_then(|v| v.as_str()).unwrap_or("");

        let command = format!(
            "mkdir -p $(dirname '{path}') && cat > '{path}' << 'EOFWRITE'\n{content}\nEOFWRITE",
        );
        let response = self.remote.bash(&command).await;

        match response {
            RemoteResponse::Json(_) => Ok(Observation::text(format!("Wrote to {}", path))),
            RemoteResponse::Error(body) => {
                Ok(Observation::text(format!("Error writing {}: {}", path, body)))
            }
        }
    }
}

/// Browser automation: hands a natural-language instruction to the
/// browser-use agent on the remote host, with a visible display.
pub struct RemoteBrowserTool {
    remote: Arc<RemoteClient>,
}

impl RemoteBrowserTool {
    pub fn new(remote: Arc<RemoteClient>) -> Self {
        Self { remote }
    }
}

#[async_trait]
impl Tool for RemoteBrowserTool {
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

        let script = browser_script(instruction);
        let command = format!(
            "export DISPLAY=:0 && cd ~/browser-use-env && source bin/activate && python3 -c '{}'",
            script
        );
        let response = self.remote.bash(&command).await;

        match &response {
            RemoteResponse::Json(_) => {
                let output = response.field_str("output").unwrap_or("Browser task completed");
                Ok(Observation::text(truncate_output(
                    output,
                    ctx.browser_output_cap,
                )))
            }
            RemoteResponse::Error(body) => {
                Ok(Observation::text(format!("Browser error: {}", body)))
            }
        }
    }
}

/// Python driver handed to the browser-use environment. The instruction is
/// sanitized so it survives shell and Python quoting.
pub(crate) fn browser_script(instruction: &str) -> String {
    let escaped = instruction.replace('"', "'").replace('\n', " ");
    format!(
        r#"
import asyncio
import os
from browser_use import Agent
from langchain_anthropic import ChatAnthropic

os.environ["DISPLAY"] = ":0"

async def main():
    agent = Agent(
        task="{escaped}",
        llm=ChatAnthropic(model="claude-sonnet-4-20250514"),
        headless=False,
    )
    result = await agent.run()
    print(result)

asyncio.run(main())
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_browser_script_escapes_quotes_and_newlines() {
        let script = browser_script("search for \"flights\"\nto Tokyo");
        assert!(script.contains("task=\"search for 'flights' to Tokyo\""));
        assert!(script.contains("headless=False"));
    }

    #[test]
    fn test_shell_observation_formats_output() {
        let response = RemoteResponse::Json(json!({ "output": "hello", "exit_code": 0 }));
        assert_eq!(
            shell_observation(&response, 3000),
            Observation::text("Exit code: 0\nOutput: hello")
        );
    }

    #[test]
    fn test_shell_observation_error_body() {
        let response = RemoteResponse::Error("502 bad gateway".to_string());
        assert_eq!(
            shell_observation(&response, 3000),
            Observation::text("Remote error: 502 bad gateway")
        );
    }

    #[test]
    fn test_shell_observation_caps_output() {
        let response = RemoteResponse::Json(json!({
            "output": "y".repeat(50),
            "exit_code": 0
        }));
        match shell_observation(&response, 10) {
            Observation::Text(text) => assert!(text.contains("truncated at 10")),
            other => panic!("expected text, got {:?}", other),
        }
    }
}
