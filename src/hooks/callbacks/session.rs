//! Session row bookkeeping on start and end.

use anyhow::Result;
use async_trait::async_trait;

use crate::hooks::event::{HookEvent, HookInput};
use crate::hooks::orchestrator::{Callback, CallbackOutcome, HookContext};
use crate::store::sessions;

/// Opens the session row and closes stale open sessions of the same project.
pub struct OpenSession;

#[async_trait]
impl Callback for OpenSession {
    fn name(&self) -> &str {
        "session-open"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::SessionStart]
    }

    fn priority(&self) -> i32 {
        10
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        let session_id = ctx.session_id.clone();
        let project = ctx.project.clone();
        let identity = ctx.config.identity.name.clone();
        let cutoff = stale_cutoff(ctx.config.hooks.stale_session_hours);

        let swept = ctx
            .with_db(move |conn| {
                sessions::open_session(conn, &session_id, &identity, &project)?;
                match cutoff {
                    Some(cutoff) => sessions::close_abandoned(conn, &project, &cutoff, &session_id),
                    None => Ok(0),
                }
            })
            .await?;
        tracing::info!(
            session_id = %ctx.session_id,
            project = %ctx.project,
            source = input.source.as_deref().unwrap_or("startup"),
            swept,
            "session opened"
        );
        Ok(CallbackOutcome::none())
    }
}

/// Sessions started before this instant count as abandoned. `None` disables
/// the sweep: a non-positive age, or one reaching past the representable range.
fn stale_cutoff(hours: i64) -> Option<String> {
    if hours <= 0 {
        return None;
    }
    chrono::TimeDelta::try_hours(hours)
        .and_then(|age| chrono::Utc::now().checked_sub_signed(age))
        .map(|cutoff| cutoff.to_rfc3339())
}

/// Closes the session row when the host reports the session ended.
pub struct CloseSession;

#[async_trait]
impl Callback for CloseSession {
    fn name(&self) -> &str {
        "session-close"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::SessionEnd]
    }

    fn priority(&self) -> i32 {
        900
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        let session_id = ctx.session_id.clone();
        let closed = ctx
            .with_db(move |conn| sessions::close_session_implicit(conn, &session_id))
            .await?;
        tracing::info!(
            session_id = %ctx.session_id,
            reason = input.reason.as_deref().unwrap_or("unknown"),
            closed,
            "session ended"
        );
        Ok(CallbackOutcome::none())
    }
}
