//! System instruction and initial turn assembly
//!
//! Both backends share the same shape: a bounded excerpt of the vault's
//! behavioral guidance, a bounded excerpt of vault context, then tool
//! guidance specific to the backend's capabilities.

use crate::tasks::Task;

/// Character budget for the guidance excerpt (full backend).
const FULL_GUIDANCE_BUDGET: usize = 3500;
/// Character budget for the vault context excerpt (full backend).
const FULL_CONTEXT_BUDGET: usize = 1500;
/// Character budgets for the degraded backend.
const DEGRADED_GUIDANCE_BUDGET: usize = 3000;
const DEGRADED_CONTEXT_BUDGET: usize = 2000;

const DEFAULT_PERSONA: &str = "You are an autonomous assistant working from a markdown knowledge vault.";

/// Take at most `max` characters of a string.
pub fn excerpt(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub fn system_prompt_full(guidance: &str, vault_context: &str) -> String {
    let persona = if guidance.is_empty() {
        DEFAULT_PERSONA
    } else {
        excerpt(guidance, FULL_GUIDANCE_BUDGET)
    };

    format!(
        r#"{persona}

---

## Your Memory Vault
Location: ~/vault/
{context}

## CRITICAL: GUI-First Approach
**ALWAYS use GUI tools first for user-facing tasks!**

### For Web Tasks (booking, searching, browsing):
1. **First**: Use 'computer' tool with action='click' to click the browser icon/app
2. **Then**: Use 'browser_use' tool for web automation, OR
3. **Or**: Use 'computer' tool with action='type' to type URLs, then action='key' to press Return
4. **Take screenshots when necessary** (action='screenshot') to see what's happening

### For GUI Tasks:
- **Open apps**: Click on desktop icons or taskbar buttons
- **Interact with windows**: Click, type, scroll using 'computer' tool
- **Take screenshots**: Use action='screenshot' often to see the current state
- **Don't just use bash** - if the user can see it, use GUI tools!

### When to use bash:
- Only for background operations (git, file management)
- NOT for opening applications or web browsing
- NOT for tasks the user should see happening

**Remember**: If the task involves opening a browser, booking something, or any visual interaction - USE GUI TOOLS, not bash!
"#,
        context = excerpt(vault_context, FULL_CONTEXT_BUDGET),
    )
}

pub fn system_prompt_degraded(guidance: &str, vault_context: &str) -> String {
    let persona = if guidance.is_empty() {
        DEFAULT_PERSONA
    } else {
        excerpt(guidance, DEGRADED_GUIDANCE_BUDGET)
    };

    format!(
        r#"{persona}

---

## Your Memory Vault
Location: ~/vault/
{context}

## Tool Guidelines
1. **For web tasks (booking, searching, browsing)**: ALWAYS use 'browser_use' tool - it will open a visible browser
2. Use tools aggressively to accomplish the task
3. Save learnings to ~/vault/context/
4. When done, use task_complete tool with summary

**CRITICAL**: For tasks involving browsers, booking, or web research - use 'browser_use' tool, NOT bash commands!
"#,
        context = excerpt(vault_context, DEGRADED_CONTEXT_BUDGET),
    )
}

/// Text of the initial user turn. `has_capture` means an image block
/// precedes this text in the same turn.
pub fn initial_turn_text(task: &Task, has_capture: bool) -> String {
    let context = task
        .context
        .iter()
        .map(|c| format!("  - {}", c))
        .collect::<Vec<_>>()
        .join("\n");

    if has_capture {
        format!(
            r#"Execute this task:

**{title}** ({priority})
{context}

**IMPORTANT**: This task should be performed using GUI interactions visible on screen:
- For web tasks: Open browser using computer tool (click browser icon), then use browser_use tool
- Take screenshots frequently to see your progress
- Use GUI tools (click, type, key) rather than bash commands when the user should see the interaction

Here's the current screen. Start by taking a screenshot if needed, then begin the task using GUI tools. Call task_complete when finished."#,
            title = task.title,
            priority = task.priority,
        )
    } else {
        format!(
            r#"Execute this task:

**{title}** ({priority})
{context}

Use tools to complete this. Call task_complete when finished."#,
            title = task.title,
            priority = task.priority,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::Priority;

    #[test]
    fn test_excerpt_bounds() {
        assert_eq!(excerpt("hello", 10), "hello");
        assert_eq!(excerpt("hello", 3), "hel");
        // Multibyte safety
        assert_eq!(excerpt("ééé", 2), "éé");
    }

    #[test]
    fn test_guidance_is_truncated() {
        let guidance = "g".repeat(10_000);
        let prompt = system_prompt_full(&guidance, "");
        assert!(prompt.len() < 10_000);
        assert!(prompt.contains("GUI-First"));
    }

    #[test]
    fn test_default_persona_when_guidance_empty() {
        let prompt = system_prompt_degraded("", "some context");
        assert!(prompt.contains("autonomous assistant"));
        assert!(prompt.contains("some context"));
        assert!(prompt.contains("browser_use"));
    }

    #[test]
    fn test_initial_turn_mentions_task_and_priority() {
        let mut task = Task::new("Check email", Priority::P0);
        task.context.push("use the work account".to_string());

        let text = initial_turn_text(&task, false);
        assert!(text.contains("**Check email** (P0)"));
        assert!(text.contains("  - use the work account"));
        assert!(text.contains("task_complete"));
        assert!(!text.contains("current screen"));

        let with_capture = initial_turn_text(&task, true);
        assert!(with_capture.contains("current screen"));
    }
}
