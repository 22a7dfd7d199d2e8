//! Per-project session state: a mutable singleton, last writer wins.
//!
//! Every write bumps `revision`. Callers that need to detect a concurrent writer
//! use [`checkpoint_if_revision`], which only applies when the stored revision
//! still matches what they read.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

use super::types::SessionState;

/// Fields written by a checkpoint. `None` focus keeps the stored focus.
#[derive(Debug, Default, Clone)]
pub struct Checkpoint<'a> {
    pub current_focus: Option<&'a str>,
    pub next_steps: &'a [String],
    pub updated_by: Option<&'a str>,
}

pub fn get_state(conn: &Connection, project: &str) -> Result<Option<SessionState>> {
    let state = conn
        .query_row(
            "SELECT project, current_focus, next_steps, updated_at, updated_by, revision
             FROM session_state WHERE project = ?1",
            params![project],
            |row| {
                let next_steps: String = row.get(2)?;
                Ok(SessionState {
                    project: row.get(0)?,
                    current_focus: row.get(1)?,
                    next_steps: serde_json::from_str(&next_steps).unwrap_or_default(),
                    updated_at: row.get(3)?,
                    updated_by: row.get(4)?,
                    revision: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(state)
}

/// Unconditional upsert. Returns the new revision.
pub fn checkpoint(conn: &Connection, project: &str, cp: &Checkpoint<'_>) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    let next_steps = serde_json::to_string(cp.next_steps)?;
    conn.execute(
        "INSERT INTO session_state (project, current_focus, next_steps, updated_at, updated_by, revision)
         VALUES (?1, ?2, ?3, ?4, ?5, 1)
         ON CONFLICT(project) DO UPDATE SET
             current_focus = COALESCE(excluded.current_focus, session_state.current_focus),
             next_steps = excluded.next_steps,
             updated_at = excluded.updated_at,
             updated_by = excluded.updated_by,
             revision = session_state.revision + 1",
        params![project, cp.current_focus, next_steps, now, cp.updated_by],
    )?;
    let revision: i64 = conn.query_row(
        "SELECT revision FROM session_state WHERE project = ?1",
        params![project],
        |row| row.get(0),
    )?;
    tracing::debug!(project, revision, "session state checkpointed");
    Ok(revision)
}

/// Optimistic upsert: applies only if the stored revision equals `expected`
/// (`0` meaning "no row yet"). Returns the new revision, or `None` on conflict.
pub fn checkpoint_if_revision(
    conn: &mut Connection,
    project: &str,
    expected: i64,
    cp: &Checkpoint<'_>,
) -> Result<Option<i64>> {
    let tx = conn.transaction()?;
    let current = get_state(&tx, project)?.map(|s| s.revision).unwrap_or(0);
    if current != expected {
        tracing::warn!(project, expected, current, "session state revision conflict");
        return Ok(None);
    }
    let revision = checkpoint(&tx, project, cp)?;
    tx.commit()?;
    Ok(Some(revision))
}
