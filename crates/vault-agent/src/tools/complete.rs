//! Terminal signal tool

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{Observation, ParameterProperty, ParameterSchema, Tool, ToolContext};

/// The sole terminal signal. Touches nothing; the agent loop terminates
/// when it sees the resulting observation.
pub struct TaskCompleteTool;

#[async_trait]
impl Tool for TaskCompleteTool {
    fn name(&self) -> &str {
        "task_complete"
    }

    fn description(&self) -> &str {
        "Mark the current task as complete with a summary."
    }

    fn parameters_schema(&self) -> ParameterSchema {
        ParameterSchema::new().with_required(
            "summary",
            ParameterProperty::string("Summary of what was accomplished"),
        )
    }

    async fn execute(&self, args: &Value, _ctx: &ToolContext) -> Result<Observation> {
        let summary = args
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or("Completed");
        Ok(Observation::Completed(summary.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_returns_completed_with_summary() {
        let tool = TaskCompleteTool;
        let ctx = ToolContext::default();

        let observation = tool
            .execute(&json!({ "summary": "Checked inbox, no action needed" }), &ctx)
            .await
            .unwrap();

        assert_eq!(
            observation,
            Observation::Completed("Checked inbox, no action needed".to_string())
        );
    }

    #[tokio::test]
    async fn test_missing_summary_defaults() {
        let tool = TaskCompleteTool;
        let ctx = ToolContext::default();

        let observation = tool.execute(&json!({}), &ctx).await.unwrap();
        assert_eq!(observation, Observation::Completed("Completed".to_string()));
    }
}
