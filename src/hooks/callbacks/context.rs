//! Context injected at session start and before compaction.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write;
use std::path::Path;

use crate::hooks::event::{HookEvent, HookInput};
use crate::hooks::orchestrator::{Callback, CallbackOutcome, HookContext};
use crate::store::types::{Session, SessionState};
use crate::store::{sessions, state};

/// Banner, saved project state, and a warning about other open sessions.
pub struct StartContext;

#[async_trait]
impl Callback for StartContext {
    fn name(&self) -> &str {
        "start-context"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::SessionStart]
    }

    fn priority(&self) -> i32 {
        30
    }

    async fn run(&self, ctx: &HookContext, _input: &HookInput) -> Result<CallbackOutcome> {
        let project = ctx.project.clone();
        let session_id = ctx.session_id.clone();
        let identity = ctx.config.identity.name.clone();

        let (saved, others) = ctx
            .with_db(move |conn| {
                let saved = state::get_state(conn, &project)?;
                let others = sessions::open_sessions_for_identity(conn, &identity, &session_id)?;
                Ok((saved, others))
            })
            .await?;

        if !others.is_empty() {
            tracing::warn!(
                session_id = %ctx.session_id,
                identity = %ctx.config.identity.name,
                open = others.len(),
                "identity already has open sessions"
            );
        }

        let mut text = format!(
            "Session {} started for project {} at {}.",
            ctx.session_id,
            ctx.project,
            chrono::Utc::now().format("%Y-%m-%d %H:%M UTC")
        );
        if let Some(saved) = &saved {
            text.push_str("\n\n");
            text.push_str(&render_state(saved));
        }
        if !others.is_empty() {
            text.push_str("\n\n");
            text.push_str(&render_open_sessions(&others));
        }
        Ok(CallbackOutcome::context(text))
    }
}

/// Points the assistant back at its instruction files and saved state before
/// context is compacted away.
pub struct CompactRefresh;

#[async_trait]
impl Callback for CompactRefresh {
    fn name(&self) -> &str {
        "compact-refresh"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreCompact]
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        let trigger = input.trigger.as_deref().unwrap_or("unknown");
        let mut text = format!(
            "Context compaction ({trigger}). Before continuing, re-read:\n{}",
            instruction_files(&ctx.cwd)
                .iter()
                .map(|p| format!("- {}", p.display()))
                .collect::<Vec<_>>()
                .join("\n")
        );

        let project = ctx.project.clone();
        match ctx.with_db(move |conn| state::get_state(conn, &project)).await {
            Ok(Some(saved)) => {
                text.push_str("\n\n");
                text.push_str(&render_state(&saved));
            }
            Ok(None) => {}
            // The reminder is still useful without saved state.
            Err(e) => tracing::debug!(error = %e, "no session state for compaction refresh"),
        }
        Ok(CallbackOutcome::context(text))
    }
}

fn instruction_files(cwd: &Path) -> Vec<std::path::PathBuf> {
    let mut files = Vec::new();
    if let Some(home) = dirs::home_dir() {
        files.push(home.join(".claude").join("CLAUDE.md"));
    }
    files.push(cwd.join("CLAUDE.md"));
    files
}

pub fn render_state(saved: &SessionState) -> String {
    let mut text = String::from("Where work left off:");
    if let Some(focus) = &saved.current_focus {
        let _ = write!(text, "\nFocus: {focus}");
    }
    if !saved.next_steps.is_empty() {
        text.push_str("\nNext steps:");
        for step in &saved.next_steps {
            let _ = write!(text, "\n- {step}");
        }
    }
    let _ = write!(text, "\n(updated {}, revision {})", saved.updated_at, saved.revision);
    text
}

fn render_open_sessions(others: &[Session]) -> String {
    let mut text = String::from("Warning: other sessions for this identity are still open:");
    for s in others {
        let _ = write!(text, "\n- {} ({}, started {})", s.id, s.project, s.started_at);
    }
    text.push_str("\nClose them with `conductor session end --session <id>` when finished.");
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_lists_focus_and_steps() {
        let saved = SessionState {
            project: "alpha".into(),
            current_focus: Some("merge engine".into()),
            next_steps: vec!["cycle tests".into(), "docs".into()],
            updated_at: "2024-05-01T10:00:00Z".into(),
            updated_by: Some("s0".into()),
            revision: 3,
        };
        let text = render_state(&saved);
        assert!(text.contains("Focus: merge engine"));
        assert!(text.contains("- cycle tests\n- docs"));
        assert!(text.contains("revision 3"));
    }

    #[test]
    fn project_instructions_are_listed() {
        let files = instruction_files(Path::new("/work/alpha"));
        assert_eq!(files.last().unwrap(), Path::new("/work/alpha/CLAUDE.md"));
    }
}
