//! Tool framework for agent execution
//!
//! Every capability the model can invoke is a [`Tool`]: a name, a
//! JSON-Schema shaped parameter declaration, and an execute method that
//! produces exactly one [`Observation`].

pub mod complete;
pub mod dispatch;
pub mod local;
pub mod registry;
pub mod remote;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

use agent_core::screenshot::ImageTransport;
use agent_core::{RemoteClient, ScreenshotResolver, ToolSchema};

use crate::sync::GitSync;
use registry::ToolRegistry;

/// What a tool hands back to the agent loop.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Plain text fed back as a tool result.
    Text(String),
    /// A captured frame, carried by reference or inline.
    Image(ImageTransport),
    /// The terminal signal: the task is done, with a summary.
    Completed(String),
}

impl Observation {
    pub fn text(content: impl Into<String>) -> Self {
        Observation::Text(content.into())
    }
}

/// A tool invocation issued by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Value,
}

/// Context provided to tools during execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Knowledge-store root; writes under it trigger a sync push.
    pub vault_root: PathBuf,
    /// Byte cap on file reads.
    pub read_byte_cap: usize,
    /// Character cap on shell output.
    pub shell_output_cap: usize,
    /// Character cap on browser automation output.
    pub browser_output_cap: usize,
    /// Timeout for local shell commands in seconds.
    pub command_timeout_secs: u64,
    /// Timeout for browser automation in seconds.
    pub browser_timeout_secs: u64,
}

impl Default for ToolContext {
    fn default() -> Self {
        Self {
            vault_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("vault"),
            read_byte_cap: 8000,
            shell_output_cap: 3000,
            browser_output_cap: 3000,
            command_timeout_secs: 120,
            browser_timeout_secs: 300,
        }
    }
}

impl ToolContext {
    pub fn new(vault_root: PathBuf) -> Self {
        Self {
            vault_root,
            ..Default::default()
        }
    }
}

/// Schema for a single tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterProperty {
    #[serde(rename = "type")]
    pub param_type: String,
    pub description: String,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl ParameterProperty {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            param_type: "string".to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    pub fn integer(description: impl Into<String>) -> Self {
        Self {
            param_type: "integer".to_string(),
            description: description.into(),
            enum_values: None,
        }
    }

    pub fn with_enum(mut self, values: &[&str]) -> Self {
        self.enum_values = Some(values.iter().map(|s| s.to_string()).collect());
        self
    }
}

/// JSON-Schema object declaring a tool's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: std::collections::BTreeMap<String, ParameterProperty>,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: std::collections::BTreeMap::new(),
            required: Vec::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        self.properties.insert(name.into(), prop);
        self
    }

    pub fn with_required(mut self, name: impl Into<String>, prop: ParameterProperty) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), prop);
        self.required.push(name);
        self
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::new()
    }
}

/// The trait all tools implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters_schema(&self) -> ParameterSchema;

    /// Perform the side effect and produce exactly one observation.
    ///
    /// Returning `Err` is allowed for handler-internal faults; the
    /// dispatcher absorbs it into a text observation.
    async fn execute(&self, args: &Value, ctx: &ToolContext) -> Result<Observation>;

    /// Declaration sent to the model provider.
    fn to_schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: serde_json::to_value(self.parameters_schema())
                .unwrap_or_else(|_| serde_json::json!({ "type": "object" })),
        }
    }
}

/// Registry for the full-capability backend: remote computer control plus
/// remote shell and file tools.
pub fn full_registry(
    remote: Arc<RemoteClient>,
    resolver: Arc<ScreenshotResolver>,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(remote::ComputerTool::new(Arc::clone(&remote), resolver));
    registry.register(remote::RemoteBashTool::new(Arc::clone(&remote)));
    registry.register(remote::RemoteReadFileTool::new(Arc::clone(&remote)));
    registry.register(remote::RemoteWriteFileTool::new(Arc::clone(&remote)));
    registry.register(remote::RemoteBrowserTool::new(remote));
    registry.register(complete::TaskCompleteTool);

    registry
}

/// Registry for the degraded backend: same tool set minus `computer`,
/// executed against the local host.
pub fn degraded_registry(sync: Arc<GitSync>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(local::LocalBashTool);
    registry.register(local::LocalReadFileTool);
    registry.register(local::LocalWriteFileTool::new(sync));
    registry.register(local::LocalBrowserTool);
    registry.register(complete::TaskCompleteTool);

    registry
}

/// Cap a string at `max` characters, marking the cut.
pub fn truncate_output(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max).collect();
    format!("{}\n[truncated at {} characters]", cut, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_schema_shape() {
        let schema = ParameterSchema::new()
            .with_required("command", ParameterProperty::string("Shell command"))
            .with_property(
                "direction",
                ParameterProperty::string("Scroll direction").with_enum(&["up", "down"]),
            );

        let value = serde_json::to_value(&schema).unwrap();
        assert_eq!(value["type"], "object");
        assert_eq!(value["properties"]["command"]["type"], "string");
        assert_eq!(value["properties"]["direction"]["enum"][1], "down");
        assert_eq!(value["required"][0], "command");
    }

    #[test]
    fn test_truncate_output() {
        assert_eq!(truncate_output("short", 10), "short");

        let long = "x".repeat(20);
        let capped = truncate_output(&long, 10);
        assert!(capped.starts_with("xxxxxxxxxx\n"));
        assert!(capped.contains("truncated at 10"));
    }

    #[test]
    fn test_truncate_output_multibyte() {
        let s = "é".repeat(20);
        let capped = truncate_output(&s, 10);
        assert!(capped.contains("truncated"));
    }
}
