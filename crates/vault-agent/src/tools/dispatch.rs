//! Tool dispatch
//!
//! Maps a model-issued invocation to a concrete tool and folds every
//! failure mode into an observation. The agent loop never sees a raised
//! fault from a tool: unknown names and handler errors come back as text,
//! preserving conversational continuity.

use tracing::{debug, info, instrument, warn};

use super::registry::ToolRegistry;
use super::{Observation, ToolContext, ToolInvocation};

pub struct Dispatcher {
    registry: ToolRegistry,
}

impl Dispatcher {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatch one invocation. Total: always produces an observation.
    #[instrument(skip(self, ctx), fields(tool = %invocation.name))]
    pub async fn dispatch(&self, invocation: &ToolInvocation, ctx: &ToolContext) -> Observation {
        let tool = match self.registry.get(&invocation.name) {
            Some(tool) => tool,
            None => {
                warn!(tool = %invocation.name, "Unrecognized tool requested");
                return Observation::text(format!("Unrecognized tool: {}", invocation.name));
            }
        };

        debug!(args = %invocation.arguments, "Executing tool");

        match tool.execute(&invocation.arguments, ctx).await {
            Ok(observation) => {
                info!(tool = %invocation.name, "Tool executed");
                observation
            }
            Err(e) => {
                warn!(tool = %invocation.name, error = %e, "Tool execution error");
                Observation::text(format!("Tool error: {}", e))
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParameterProperty, ParameterSchema, Tool};
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes input"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new().with_required("text", ParameterProperty::string("Text"))
        }

        async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<Observation> {
            let text = args.get("text").and_then(|v| v.as_str()).unwrap_or("empty");
            Ok(Observation::text(text))
        }
    }

    struct FaultyTool;

    #[async_trait]
    impl Tool for FaultyTool {
        fn name(&self) -> &str {
            "faulty"
        }

        fn description(&self) -> &str {
            "Always fails"
        }

        fn parameters_schema(&self) -> ParameterSchema {
            ParameterSchema::new()
        }

        async fn execute(&self, _args: &Value, _ctx: &ToolContext) -> Result<Observation> {
            bail!("handler exploded")
        }
    }

    fn dispatcher() -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool);
        registry.register(FaultyTool);
        Dispatcher::new(registry)
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let dispatcher = dispatcher();
        let ctx = ToolContext::default();

        let observation = dispatcher
            .dispatch(
                &ToolInvocation {
                    name: "echo".to_string(),
                    arguments: json!({ "text": "hello" }),
                },
                &ctx,
            )
            .await;

        assert_eq!(observation, Observation::text("hello"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_text_observation() {
        let dispatcher = dispatcher();
        let ctx = ToolContext::default();

        let observation = dispatcher
            .dispatch(
                &ToolInvocation {
                    name: "nonexistent".to_string(),
                    arguments: json!({}),
                },
                &ctx,
            )
            .await;

        assert_eq!(
            observation,
            Observation::text("Unrecognized tool: nonexistent")
        );
    }

    #[tokio::test]
    async fn test_handler_error_is_absorbed() {
        let dispatcher = dispatcher();
        let ctx = ToolContext::default();

        let observation = dispatcher
            .dispatch(
                &ToolInvocation {
                    name: "faulty".to_string(),
                    arguments: json!({}),
                },
                &ctx,
            )
            .await;

        match observation {
            Observation::Text(text) => assert!(text.contains("handler exploded")),
            other => panic!("expected text observation, got {:?}", other),
        }
    }
}
