//! Agent loop: the bounded request/response cycle coordinating the model
//! provider and tool execution for one task.

pub mod agent_loop;
pub mod prompt;
pub mod state;

pub use agent_loop::AgentLoop;
pub use state::AgentState;

use serde::{Deserialize, Serialize};

/// Terminal artifact of one agent loop run. Exactly one is produced per
/// task; ownership passes to the archival collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn completed(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}
