//! Tool-use callbacks: artifact guard, standards injection, and audit.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write;
use std::path::{Component, Path, PathBuf};

use crate::hooks::event::{HookEvent, HookInput};
use crate::hooks::orchestrator::{Callback, CallbackOutcome, HookContext};
use crate::store::{standards, usage};

const FILE_EDIT_TOOLS: &[&str] = &["Write", "Edit", "MultiEdit"];

fn is_file_edit(input: &HookInput) -> bool {
    input
        .tool_name
        .as_deref()
        .is_some_and(|tool| FILE_EDIT_TOOLS.contains(&tool))
}

/// Resolve `target` against `cwd` and drop `.`/`..` components without
/// touching the filesystem.
fn normalize(cwd: &Path, target: &str) -> PathBuf {
    let joined = cwd.join(target);
    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Denies direct edits to the generated artifact.
pub struct ArtifactGuard;

#[async_trait]
impl Callback for ArtifactGuard {
    fn name(&self) -> &str {
        "artifact-guard"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreToolUse]
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        if !is_file_edit(input) {
            return Ok(CallbackOutcome::none());
        }
        let Some(target) = input.target_file() else {
            return Ok(CallbackOutcome::none());
        };

        let artifact = normalize(&ctx.cwd, &ctx.config.deploy.artifact_path);
        if normalize(&ctx.cwd, target) != artifact {
            return Ok(CallbackOutcome::none());
        }

        tracing::info!(
            session_id = %ctx.session_id,
            path = %artifact.display(),
            "blocked edit of generated artifact"
        );
        Ok(CallbackOutcome::deny(format!(
            "{} is generated from the conductor database on every session start. \
             Change templates or the project override instead (`conductor project override {}`).",
            ctx.config.deploy.artifact_path, ctx.project
        )))
    }
}

/// Injects guidance from `standards` rows whose pattern matches the edited path.
pub struct StandardsContext;

#[async_trait]
impl Callback for StandardsContext {
    fn name(&self) -> &str {
        "standards-context"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreToolUse]
    }

    fn priority(&self) -> i32 {
        40
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        if !is_file_edit(input) {
            return Ok(CallbackOutcome::none());
        }
        let Some(target) = input.target_file() else {
            return Ok(CallbackOutcome::none());
        };

        let path = target.to_string();
        let matched = ctx
            .with_db(move |conn| standards::matching_standards(conn, &path))
            .await?;
        if matched.is_empty() {
            return Ok(CallbackOutcome::none());
        }

        let mut text = format!("Standards for {target}:");
        for standard in &matched {
            let _ = write!(text, "\n- {}: {}", standard.name, standard.guidance);
        }
        Ok(CallbackOutcome::context(text))
    }
}

/// Logs gated calls and records completed ones in `tool_usage`.
pub struct ToolAudit;

#[async_trait]
impl Callback for ToolAudit {
    fn name(&self) -> &str {
        "tool-audit"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::PreToolUse, HookEvent::PostToolUse]
    }

    fn priority(&self) -> i32 {
        1000
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        let tool = input.tool_name.clone().unwrap_or_default();
        if input.event() == Some(HookEvent::PreToolUse) {
            tracing::debug!(
                session_id = %ctx.session_id,
                tool = %tool,
                target = input.target_file().unwrap_or(""),
                "tool call gated"
            );
            return Ok(CallbackOutcome::none());
        }

        let success = tool_succeeded(input.tool_response.as_ref());
        let session_id = ctx.session_id.clone();
        let project = ctx.project.clone();
        ctx.with_db(move |conn| {
            usage::log_tool_usage(conn, Some(&session_id), Some(&project), &tool, success)
        })
        .await?;
        Ok(CallbackOutcome::none())
    }
}

/// A response counts as failed when it says so with `success: false` or
/// `is_error: true`.
fn tool_succeeded(response: Option<&serde_json::Value>) -> bool {
    let Some(response) = response else {
        return true;
    };
    let explicit_failure = response.get("success").and_then(|v| v.as_bool()) == Some(false);
    let flagged_error = response.get("is_error").and_then(|v| v.as_bool()) == Some(true);
    !(explicit_failure || flagged_error)
}
