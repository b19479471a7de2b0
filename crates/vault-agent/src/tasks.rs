//! Task selection
//!
//! Tasks come from three tiers: explicit checkbox entries in tasks.md
//! (P0), unchecked todos in recent daily notes (P1), and scattered todos
//! anywhere else in the vault (P2). The execution engine consumes whatever
//! this module hands it and never mutates a task.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info};
use walkdir::WalkDir;

use agent_core::config::VaultConfig;

/// Priority tier of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    P0,
    P1,
    P2,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::P0 => write!(f, "P0"),
            Priority::P1 => write!(f, "P1"),
            Priority::P2 => write!(f, "P2"),
        }
    }
}

/// One unit of work selected for execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub title: String,
    pub context: Vec<String>,
    pub priority: Priority,
    /// The raw source line, used to mark the origin complete. Empty for
    /// tasks without an origin line.
    pub raw_line: String,
    /// File the task was found in, when not tasks.md.
    pub source: Option<PathBuf>,
}

impl Task {
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            context: Vec::new(),
            priority,
            raw_line: String::new(),
            source: None,
        }
    }
}

/// Titles matching these phrases are maintenance noise, not real work.
/// Policy table: owned by task selection, not by the execution engine.
const DEGENERATE_TITLE_PATTERNS: &[&str] = &[
    "check daily",
    "check for daily",
    "verify daily exists",
    "check if daily",
    "scan daily",
    "look for daily",
];

pub fn is_degenerate(title: &str) -> bool {
    let lower = title.to_lowercase();
    DEGENERATE_TITLE_PATTERNS
        .iter()
        .any(|pattern| lower.contains(pattern))
}

/// Parse unchecked `- [ ]` entries from tasks.md content. Plain bullets
/// below an entry become its context lines.
pub fn parse_explicit_tasks(content: &str) -> Vec<Task> {
    let mut tasks = Vec::new();
    let mut current: Option<Task> = None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(rest) = trimmed.strip_prefix("- [ ]") {
            if let Some(task) = current.take() {
                tasks.push(task);
            }
            current = Some(Task {
                title: rest.trim().to_string(),
                context: Vec::new(),
                priority: Priority::P0,
                raw_line: line.to_string(),
                source: None,
            });
        } else if let Some(task) = current.as_mut() {
            // Sub-bullets carry context; checked entries do not
            if trimmed.starts_with('-') && !trimmed.starts_with("- [") {
                task.context
                    .push(trimmed.trim_start_matches('-').trim().to_string());
            }
        }
    }

    if let Some(task) = current {
        tasks.push(task);
    }

    tasks
}

fn todo_from_line(line: &str) -> Option<String> {
    if !line.contains("- [ ]") {
        return None;
    }
    let trimmed = line.trim();
    let title = trimmed.strip_prefix("- [ ]").unwrap_or(trimmed).trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Scan recent daily notes for unchecked todos (P1).
pub fn scan_daily_notes(vault: &VaultConfig) -> Vec<Task> {
    let daily_dir = vault.daily_dir();
    if !daily_dir.is_dir() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(&daily_dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
                .collect()
        })
        .unwrap_or_default();
    files.sort();
    files.reverse();

    let mut tasks = Vec::new();
    for file in files.into_iter().take(7) {
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        for line in content.lines() {
            if let Some(title) = todo_from_line(line) {
                tasks.push(Task {
                    title,
                    context: vec![format!("From daily note: {}", name)],
                    priority: Priority::P1,
                    raw_line: line.to_string(),
                    source: Some(file.clone()),
                });
            }
        }
    }

    tasks
}

fn skip_path(path: &std::path::Path) -> bool {
    path.components().any(|c| {
        matches!(
            c.as_os_str().to_str(),
            Some(".obsidian") | Some("completed_tasks") | Some("logs") | Some("Daily")
        )
    })
}

/// Scan the rest of the vault for scattered todos (P2), capped at 5.
pub fn scan_vault_todos(vault: &VaultConfig) -> Vec<Task> {
    let mut tasks = Vec::new();

    for entry in WalkDir::new(&vault.root)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || path.extension().is_none_or(|ext| ext != "md") {
            continue;
        }
        if skip_path(path.strip_prefix(&vault.root).unwrap_or(path)) {
            continue;
        }
        // tasks.md and daily notes are handled by their own tiers
        if path.file_name().is_some_and(|n| n == "tasks.md") {
            continue;
        }

        let Ok(content) = std::fs::read_to_string(path) else {
            continue;
        };
        let rel = path
            .strip_prefix(&vault.root)
            .unwrap_or(path)
            .display()
            .to_string();

        for line in content.lines() {
            if let Some(title) = todo_from_line(line) {
                tasks.push(Task {
                    title,
                    context: vec![format!("Found in: {}", rel)],
                    priority: Priority::P2,
                    raw_line: line.to_string(),
                    source: Some(path.to_path_buf()),
                });
                if tasks.len() >= 5 {
                    return tasks;
                }
            }
        }
    }

    tasks
}

/// Whether the vault has enough content to warrant scanning for implicit
/// work. A fresh vault produces no inferred tasks.
pub fn is_vault_mature(vault: &VaultConfig) -> bool {
    if !vault.root.is_dir() {
        return false;
    }

    let md_files: Vec<PathBuf> = WalkDir::new(&vault.root)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| {
            p.is_file()
                && p.extension().is_some_and(|ext| ext == "md")
                && !skip_path(p.strip_prefix(&vault.root).unwrap_or(p))
        })
        .collect();

    if md_files.len() < 3 {
        return false;
    }

    // A context file with real content marks a vault in use
    if let Ok(entries) = std::fs::read_dir(vault.context_dir()) {
        for entry in entries.filter_map(|e| e.ok()) {
            if let Ok(content) = std::fs::read_to_string(entry.path()) {
                if content.trim().len() > 500 {
                    return true;
                }
            }
        }
    }

    // So does any completed task
    if let Ok(entries) = std::fs::read_dir(vault.completed_dir()) {
        if entries.filter_map(|e| e.ok()).next().is_some() {
            return true;
        }
    }

    let total: usize = md_files
        .iter()
        .take(10)
        .filter_map(|p| std::fs::read_to_string(p).ok())
        .map(|c| c.len())
        .sum();

    total >= 2000
}

/// Select the next task: explicit P0 first, then daily-note P1, then
/// scattered P2. Implicit tiers are gated on vault maturity and the
/// degenerate-title filter.
pub fn select_next_task(vault: &VaultConfig) -> Option<Task> {
    if let Ok(content) = std::fs::read_to_string(vault.tasks_file()) {
        let explicit = parse_explicit_tasks(&content);
        if let Some(task) = explicit.into_iter().next() {
            info!(title = %task.title, "Selected explicit task");
            return Some(task);
        }
    }

    if !is_vault_mature(vault) {
        debug!("Vault too new/empty for task inference");
        return None;
    }

    let daily = scan_daily_notes(vault);
    if let Some(task) = daily.into_iter().find(|t| !is_degenerate(&t.title)) {
        info!(title = %task.title, "Selected task from daily notes");
        return Some(task);
    }

    let scattered = scan_vault_todos(vault);
    if let Some(task) = scattered.into_iter().find(|t| !is_degenerate(&t.title)) {
        info!(title = %task.title, "Selected scattered vault todo");
        return Some(task);
    }

    None
}
