//! Vault reading and archival
//!
//! The vault is a directory of markdown files. This module loads the
//! behavioral guidance and context excerpts fed into system prompts, and
//! writes the archival record when a task finishes.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

use agent_core::config::VaultConfig;

use crate::agent::ExecutionResult;
use crate::tasks::Task;

/// Per-file character cap when assembling context.
const CONTEXT_FILE_CAP: usize = 3000;
/// Per-record character cap for recent completion summaries.
const COMPLETED_EXCERPT_CAP: usize = 1000;
/// How many recent completions to surface.
const RECENT_COMPLETED: usize = 3;
/// Output cap in the archival record.
const ARCHIVE_OUTPUT_CAP: usize = 5000;

fn clip(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Behavioral guidance from AGENT.md at the vault root. Missing file is
/// not an error; callers fall back to a default persona.
pub fn load_guidance(vault: &VaultConfig) -> String {
    match fs::read_to_string(vault.guidance_file()) {
        Ok(text) => text,
        Err(_) => {
            debug!("No guidance file in vault");
            String::new()
        }
    }
}

/// Assemble a bounded context digest: every context/*.md clipped per
/// file, then excerpts of the most recent completed task records.
pub fn assemble_context(vault: &VaultConfig) -> String {
    let mut sections = Vec::new();

    if let Ok(entries) = fs::read_dir(vault.context_dir()) {
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect();
        files.sort();

        for path in files {
            if let Ok(content) = fs::read_to_string(&path) {
                let name = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                sections.push(format!("### {}\n{}", name, clip(&content, CONTEXT_FILE_CAP)));
            }
        }
    }

    let recent = recent_completed(vault);
    if !recent.is_empty() {
        sections.push(format!("### Recent completions\n{}", recent.join("\n---\n")));
    }

    sections.join("\n\n")
}

fn recent_completed(vault: &VaultConfig) -> Vec<String> {
    let mut files: Vec<PathBuf> = match fs::read_dir(vault.completed_dir()) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
            .collect(),
        Err(_) => return Vec::new(),
    };

    // Archive names embed the timestamp, so name order is time order
    files.sort();
    files.reverse();

    files
        .into_iter()
        .take(RECENT_COMPLETED)
        .filter_map(|p| fs::read_to_string(&p).ok())
        .map(|content| clip(&content, COMPLETED_EXCERPT_CAP).to_string())
        .collect()
}

/// Write the archival record for a finished task and mark its origin
/// line complete. Returns the archive path.
pub fn archive_task(vault: &VaultConfig, task: &Task, result: &ExecutionResult) -> Result<PathBuf> {
    let dir = vault.completed_dir();
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let now = Local::now();
    let path = dir.join(format!("task_{}.md", now.format("%Y%m%d_%H%M%S")));

    let status = if result.success { "completed" } else { "failed" };
    let mut record = format!(
        "# Task: {title}\n\n- Status: {status}\n- Priority: {priority}\n- Finished: {finished}\n\n## Output\n\n{output}\n",
        title = task.title,
        status = status,
        priority = task.priority,
        finished = now.format("%Y-%m-%d %H:%M:%S"),
        output = clip(&result.output, ARCHIVE_OUTPUT_CAP),
    );
    if let Some(error) = &result.error {
        record.push_str(&format!("\n## Error\n\n{}\n", error));
    }

    fs::write(&path, record)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(archive = %path.display(), status, "Archived task record");

    if let Err(e) = mark_origin_complete(vault, task) {
        warn!(error = %e, "Could not mark origin line complete");
    }

    Ok(path)
}

/// Flip the task's origin line from an open to a checked box. Tasks
/// without a raw line (synthesized ones) have nothing to mark.
fn mark_origin_complete(vault: &VaultConfig, task: &Task) -> Result<()> {
    if task.raw_line.is_empty() {
        return Ok(());
    }

    let path = task
        .source
        .clone()
        .unwrap_or_else(|| vault.tasks_file());
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let marked = task.raw_line.replacen("- [ ]", "- [x]", 1);
    if marked == task.raw_line {
        return Ok(());
    }

    let updated = content.replacen(&task.raw_line, &marked, 1);
    if updated != content {
        fs::write(&path, updated)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(file = %path.display(), "Marked origin line complete");
    }

    Ok(())
}
