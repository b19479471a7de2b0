//! vault-agent: autonomous task executor for a markdown vault
//!
//! Polls the vault for open tasks, executes them through a tool-calling
//! model loop against a remote desktop or the local machine, and archives
//! the outcome back into the vault.

mod agent;
mod backend;
mod lock;
mod sync;
mod tasks;
mod tools;
mod vault;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agent_core::{AnthropicClient, Config, ModelProvider};

use backend::Executor;
use lock::TaskLock;
use sync::GitSync;
use tasks::{parse_explicit_tasks, select_next_task, Priority, Task};

#[derive(Debug, Parser)]
#[command(name = "vault-agent")]
#[command(about = "Autonomous task executor for a markdown vault", version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll the vault and execute tasks (default)
    Run {
        /// Process at most one task, then exit
        #[arg(long)]
        once: bool,
    },

    /// Execute a single ad-hoc task and exit
    Exec {
        /// The task title
        title: Vec<String>,
    },

    /// Show vault and lock status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::load()?;

    match cli.command {
        Some(Commands::Run { once }) => run(config, once).await,
        Some(Commands::Exec { title }) => exec(config, title.join(" ")).await,
        Some(Commands::Status) => status(config),
        None => run(config, false).await,
    }
}

fn build_executor(config: &Config) -> Result<(Executor, Arc<GitSync>)> {
    let provider: Arc<dyn ModelProvider> = Arc::new(AnthropicClient::new(&config.anthropic)?);
    let sync = Arc::new(GitSync::new(config.vault.root.clone()));
    let executor = Executor::new(config.clone(), provider, Arc::clone(&sync));
    Ok((executor, sync))
}

/// The polling loop. One task at a time, guarded by the filesystem lock.
async fn run(config: Config, once: bool) -> Result<()> {
    let (executor, sync) = build_executor(&config)?;
    let lock = TaskLock::new(&config.runtime.lock_path);

    info!(vault = %config.vault.root.display(), "Watching vault for tasks");

    loop {
        if lock.is_held() {
            let holder = lock.holder().unwrap_or_default();
            info!(holder = %holder.trim(), "Another task is running, waiting");
            if once {
                return Ok(());
            }
            sleep(Duration::from_secs(config.runtime.lock_wait_secs)).await;
            continue;
        }

        if let Err(e) = sync.pull().await {
            warn!(error = %e, "Vault pull failed, working from local state");
        }

        let task = match select_next_task(&config.vault) {
            Some(task) => task,
            None => {
                if once {
                    info!("No open tasks");
                    return Ok(());
                }
                sleep(Duration::from_secs(config.runtime.poll_interval_secs)).await;
                continue;
            }
        };

        // Racing instance may have taken the lock since the check above
        let guard = match lock.acquire(&task.title) {
            Ok(guard) => guard,
            Err(e) => {
                warn!(error = %e, "Could not acquire task lock");
                sleep(Duration::from_secs(config.runtime.lock_wait_secs)).await;
                continue;
            }
        };

        process_task(&config, &executor, &sync, &task).await;
        drop(guard);

        if once {
            return Ok(());
        }
    }
}

async fn process_task(config: &Config, executor: &Executor, sync: &GitSync, task: &Task) {
    info!(title = %task.title, priority = %task.priority, "Starting task");

    let result = executor.execute(task).await;
    if result.success {
        info!(title = %task.title, "Task finished");
    } else {
        warn!(title = %task.title, error = ?result.error, "Task did not finish");
    }

    if let Err(e) = vault::archive_task(&config.vault, task, &result) {
        warn!(error = %e, "Failed to archive task record");
    }

    if let Err(e) = sync.push().await {
        warn!(error = %e, "Vault push failed");
    }
}

/// Run a single ad-hoc task, bypassing vault selection.
async fn exec(config: Config, title: String) -> Result<()> {
    if title.trim().is_empty() {
        bail!("No task title given");
    }

    let (executor, sync) = build_executor(&config)?;
    let lock = TaskLock::new(&config.runtime.lock_path);
    let task = Task::new(title.trim(), Priority::P0);

    let _guard = lock.acquire(&task.title)?;
    process_task(&config, &executor, &sync, &task).await;

    Ok(())
}

fn status(config: Config) -> Result<()> {
    println!("Vault:  {}", config.vault.root.display());
    println!(
        "Remote: {}",
        if config.remote_configured() {
            "configured"
        } else {
            "not configured (degraded mode)"
        }
    );

    let lock = TaskLock::new(&config.runtime.lock_path);
    match lock.holder() {
        Some(holder) => println!("Lock:   held ({})", holder.trim()),
        None => println!("Lock:   free"),
    }

    match std::fs::read_to_string(config.vault.tasks_file()) {
        Ok(content) => {
            let open = parse_explicit_tasks(&content);
            println!("Open tasks: {}", open.len());
            for task in open {
                println!("  - [{}] {}", task.priority, task.title);
            }
        }
        Err(_) => println!("Open tasks: no tasks.md"),
    }

    Ok(())
}
