//! Backend selection and the fallback cascade
//!
//! Two execution backends share one protocol. The full backend drives a
//! remote desktop and gets the larger iteration budget; the degraded
//! backend works on the local filesystem with a smaller one. When the
//! full backend faults, the task is retried on the degraded backend
//! exactly once per task.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use agent_core::{Config, ModelProvider, RemoteClient, ScreenshotResolver};

use crate::agent::{prompt, AgentLoop, ExecutionResult};
use crate::sync::GitSync;
use crate::tasks::Task;
use crate::tools::dispatch::Dispatcher;
use crate::tools::{degraded_registry, full_registry, ToolContext};
use crate::vault;

const FULL_BUDGET: usize = 25;
const DEGRADED_BUDGET: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Full,
    Degraded,
}

pub struct Executor {
    config: Config,
    provider: Arc<dyn ModelProvider>,
    sync: Arc<GitSync>,
}

impl Executor {
    pub fn new(config: Config, provider: Arc<dyn ModelProvider>, sync: Arc<GitSync>) -> Self {
        Self {
            config,
            provider,
            sync,
        }
    }

    /// Which backend a fresh task starts on.
    pub fn preferred_backend(&self) -> Backend {
        if self.config.remote_configured() {
            Backend::Full
        } else {
            Backend::Degraded
        }
    }

    /// Execute one task to a terminal result. Never returns an error:
    /// every fault ends up inside the `ExecutionResult`.
    pub async fn execute(&self, task: &Task) -> ExecutionResult {
        let guidance = vault::load_guidance(&self.config.vault);
        let context = vault::assemble_context(&self.config.vault);

        if self.preferred_backend() == Backend::Full {
            info!(task = %task.title, "Executing on full backend");
            match self.run_full(task, &guidance, &context).await {
                Ok(result) => return result,
                Err(e) => {
                    warn!(error = %e, "Full backend faulted, falling back");
                }
            }
        }

        info!(task = %task.title, "Executing on degraded backend");
        match self.run_degraded(task, &guidance, &context).await {
            Ok(result) => result,
            Err(e) => ExecutionResult::failed(format!("Execution failed: {}", e)),
        }
    }

    async fn run_full(&self, task: &Task, guidance: &str, context: &str) -> Result<ExecutionResult> {
        let remote = Arc::new(RemoteClient::new(&self.config.remote)?);
        let resolver = Arc::new(ScreenshotResolver::new(&self.config.remote)?);

        // A failed capture degrades the initial turn to text, nothing more
        let capture = resolver.capture(true).await;

        let dispatcher = Dispatcher::new(full_registry(remote, resolver));
        let agent = AgentLoop::new(
            Arc::clone(&self.provider),
            dispatcher,
            ToolContext::new(self.config.vault.root.clone()),
            prompt::system_prompt_full(guidance, context),
            FULL_BUDGET,
        )
        .with_initial_capture(capture);

        agent.run(task).await
    }

    async fn run_degraded(
        &self,
        task: &Task,
        guidance: &str,
        context: &str,
    ) -> Result<ExecutionResult> {
        let dispatcher = Dispatcher::new(degraded_registry(Arc::clone(&self.sync)));
        let agent = AgentLoop::new(
            Arc::clone(&self.provider),
            dispatcher,
            ToolContext::new(self.config.vault.root.clone()),
            prompt::system_prompt_degraded(guidance, context),
            DEGRADED_BUDGET,
        );

        agent.run(task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;
    use agent_core::{ContentBlock, Message, MessagesResponse, StopReason, ToolSchema};
    use anyhow::bail;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted provider: pops one entry per call, recording the tool
    /// names offered on each call.
    struct CascadeProvider {
        script: Mutex<VecDeque<Result<MessagesResponse>>>,
        calls: AtomicUsize,
        offered_tools: Mutex<Vec<Vec<String>>>,
    }

    impl CascadeProvider {
        fn new(script: Vec<Result<MessagesResponse>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                offered_tools: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ModelProvider for CascadeProvider {
        async fn create_message(
            &self,
            _system: &str,
            tools: &[ToolSchema],
            _messages: &[Message],
        ) -> Result<MessagesResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.offered_tools
                .lock()
                .unwrap()
                .push(tools.iter().map(|t| t.name.clone()).collect());

            match self.script.lock().unwrap().pop_front() {
                Some(entry) => entry,
                None => bail!("script exhausted"),
            }
        }
    }

    fn done() -> Result<MessagesResponse> {
        Ok(MessagesResponse {
            content: vec![ContentBlock::text("done")],
            stop_reason: Some(StopReason::EndTurn),
        })
    }

    fn fault() -> Result<MessagesResponse> {
        bail!("provider unavailable")
    }

    fn config_with_remote(dir: &TempDir, remote: bool) -> Config {
        let toml = if remote {
            // Port 1 refuses connections immediately, so the initial
            // capture fails fast without touching the network proper
            r#"
[remote]
base_url = "http://127.0.0.1:1/api"
api_key = "test-key"
computer_id = "test-computer"
"#
            .to_string()
        } else {
            String::new()
        };
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, format!("{}\n[vault]\nroot = {:?}\n", toml, dir.path())).unwrap();
        Config::load_from(&path).unwrap()
    }

    fn executor(config: Config, provider: Arc<CascadeProvider>) -> Executor {
        let sync = Arc::new(GitSync::new(config.vault.root.clone()));
        Executor::new(config, provider, sync)
    }

    #[tokio::test]
    async fn test_no_remote_credentials_starts_degraded() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(CascadeProvider::new(vec![done()]));
        let exec = executor(config_with_remote(&dir, false), Arc::clone(&provider));

        assert_eq!(exec.preferred_backend(), Backend::Degraded);
        let result = exec.execute(&Task::new("List files", Priority::P0)).await;

        assert!(result.success);
        assert_eq!(provider.calls(), 1);
        // Degraded toolset only: no remote desktop tool was offered
        let offered = provider.offered_tools.lock().unwrap();
        assert!(!offered[0].contains(&"computer".to_string()));
        assert!(offered[0].contains(&"bash".to_string()));
        assert!(offered[0].contains(&"task_complete".to_string()));
    }

    #[tokio::test]
    async fn test_full_fault_falls_back_exactly_once() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(CascadeProvider::new(vec![fault(), fault()]));
        let exec = executor(config_with_remote(&dir, true), Arc::clone(&provider));

        assert_eq!(exec.preferred_backend(), Backend::Full);
        let result = exec.execute(&Task::new("Check email", Priority::P0)).await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("provider unavailable"));
        // One full attempt, one degraded attempt, no further retries
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn test_degraded_recovers_after_full_fault() {
        let dir = TempDir::new().unwrap();
        let provider = Arc::new(CascadeProvider::new(vec![fault(), done()]));
        let exec = executor(config_with_remote(&dir, true), Arc::clone(&provider));

        let result = exec.execute(&Task::new("Check email", Priority::P0)).await;

        assert!(result.success);
        assert_eq!(result.output, "done");
        assert_eq!(provider.calls(), 2);

        let offered = provider.offered_tools.lock().unwrap();
        // First call carried the full toolset, second the degraded one
        assert!(offered[0].contains(&"computer".to_string()));
        assert!(!offered[1].contains(&"computer".to_string()));
        assert!(offered[1].contains(&"browser_use".to_string()));
    }
}
