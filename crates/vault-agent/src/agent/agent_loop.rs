//! The agent loop
//!
//! Drives a bounded sequence of request/response turns against the model
//! provider, feeding tool results back into the conversation until the
//! terminal signal or the iteration budget is reached. One loop invocation
//! owns its conversation outright; nothing is persisted at exit.
//!
//! Failure semantics: tool-level failures never reach this loop (the
//! dispatcher absorbs them into observations). Provider failures propagate
//! out as errors; the backend cascade decides what happens next.

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use agent_core::{ContentBlock, ImageTransport, Message, ModelProvider};

use super::state::AgentState;
use super::{prompt, ExecutionResult};
use crate::tasks::Task;
use crate::tools::dispatch::Dispatcher;
use crate::tools::{Observation, ToolContext, ToolInvocation};

/// Fixed terminal message when the budget runs out.
const BUDGET_EXHAUSTED: &str = "Max iterations reached";

pub struct AgentLoop {
    provider: Arc<dyn ModelProvider>,
    dispatcher: Dispatcher,
    ctx: ToolContext,
    system_prompt: String,
    max_iterations: usize,
    /// Frame attached to the initial turn, when a capture was available.
    initial_capture: Option<ImageTransport>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        dispatcher: Dispatcher,
        ctx: ToolContext,
        system_prompt: String,
        max_iterations: usize,
    ) -> Self {
        Self {
            provider,
            dispatcher,
            ctx,
            system_prompt,
            max_iterations,
            initial_capture: None,
        }
    }

    pub fn with_initial_capture(mut self, capture: Option<ImageTransport>) -> Self {
        self.initial_capture = capture;
        self
    }

    /// Run the loop for one task.
    ///
    /// Returns `Ok` for every terminal state the protocol defines,
    /// including budget exhaustion. `Err` means the provider failed or
    /// something unrecoverable happened; the caller owns that fault.
    #[instrument(skip(self, task), fields(task = %task.title, budget = self.max_iterations))]
    pub async fn run(&self, task: &Task) -> Result<ExecutionResult> {
        let mut state = AgentState::new();

        let mut content = Vec::new();
        if let Some(capture) = &self.initial_capture {
            content.push(ContentBlock::image(capture.clone().into()));
        }
        content.push(ContentBlock::text(prompt::initial_turn_text(
            task,
            self.initial_capture.is_some(),
        )));
        state.add_message(Message::user(content));

        let schemas = self.dispatcher.registry().schemas();

        while state.iteration < self.max_iterations {
            state.increment_iteration();
            debug!(
                iteration = state.iteration,
                messages = state.messages.len(),
                "Requesting model turn"
            );

            let response = self
                .provider
                .create_message(&self.system_prompt, &schemas, &state.messages)
                .await?;

            let invocations: Vec<(String, String, serde_json::Value)> = response
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if invocations.is_empty() {
                // Natural completion: no further tool call
                let text = response.text();
                let output = if text.is_empty() {
                    "Completed".to_string()
                } else {
                    text
                };
                info!(iterations = state.iteration, "Task completed naturally");
                return Ok(ExecutionResult::completed(output));
            }

            // Append the assistant turn verbatim before dispatching
            state.add_message(Message::assistant(response.content.clone()));

            let mut results = Vec::new();
            let mut terminal: Option<String> = None;

            for (id, name, input) in invocations {
                let invocation = ToolInvocation {
                    name,
                    arguments: input,
                };
                // The whole batch is dispatched for side effects even once
                // a terminal signal has been seen
                let observation = self.dispatcher.dispatch(&invocation, &self.ctx).await;

                match observation {
                    Observation::Completed(summary) => {
                        if terminal.is_none() {
                            terminal = Some(summary);
                        }
                    }
                    Observation::Text(text) => {
                        results.push(ContentBlock::tool_result_text(id, text));
                    }
                    Observation::Image(transport) => {
                        results.push(ContentBlock::tool_result_image(id, transport.into()));
                    }
                }
            }

            if let Some(summary) = terminal {
                info!(iterations = state.iteration, "Task marked complete");
                return Ok(ExecutionResult::completed(summary));
            }

            state.add_message(Message::user(results));
        }

        warn!(budget = self.max_iterations, "Iteration budget exhausted");
        Ok(ExecutionResult::failed(BUDGET_EXHAUSTED))
    }
}
