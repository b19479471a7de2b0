//! Git-based vault synchronization
//!
//! Pull before selecting a task, push after archiving or after any
//! degraded-mode vault write. Sync failures are logged by callers and
//! never abort task processing.

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

const GIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct GitSync {
    root: PathBuf,
}

impl GitSync {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    async fn git(&self, args: &[&str]) -> Result<std::process::Output> {
        let mut cmd = Command::new("git");
        cmd.args(args)
            .current_dir(&self.root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = timeout(GIT_TIMEOUT, cmd.output())
            .await
            .context("git command timed out")?
            .context("Failed to run git")?;

        Ok(output)
    }

    /// Pull the latest vault state (rebase).
    pub async fn pull(&self) -> Result<()> {
        let output = self.git(&["pull", "--rebase", "origin", "main"]).await?;

        if output.status.success() {
            info!("Git pull successful");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(stderr = %stderr.trim(), "Git pull warning");
            bail!("git pull failed: {}", stderr.trim());
        }
    }

    /// Stage everything, commit, and push. A commit with nothing staged is
    /// not an error; the push is simply skipped.
    pub async fn push(&self) -> Result<()> {
        self.git(&["add", "."]).await?;

        let message = format!(
            "vault-agent: task execution {}",
            Local::now().format("%Y-%m-%d %H:%M")
        );
        let commit = self.git(&["commit", "-m", &message]).await?;

        if !commit.status.success() {
            debug!("Nothing to commit, skipping push");
            return Ok(());
        }

        let push = self.git(&["push", "origin", "main"]).await?;
        if push.status.success() {
            info!("Pushed changes to remote");
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&push.stderr);
            bail!("git push failed: {}", stderr.trim());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_pull_outside_repo_errors_gracefully() {
        let dir = TempDir::new().unwrap();
        let sync = GitSync::new(dir.path().to_path_buf());
        // Not a repository (or git missing entirely): an error, not a panic
        assert!(sync.pull().await.is_err());
    }
}
