//! Per-session record of which lifecycle events have fired.

use anyhow::Result;
use rusqlite::{params, Connection};

/// Persist the marker for `(session_id, event)` if it does not exist yet.
///
/// Returns `true` only for the call that created the marker. This is the claim
/// the orchestrator takes before running at-most-once callbacks.
pub fn claim(conn: &Connection, session_id: &str, event: &str) -> Result<bool> {
    let now = chrono::Utc::now().to_rfc3339();
    let rows = conn.execute(
        "INSERT OR IGNORE INTO hook_markers (session_id, event, first_at, last_at, fire_count)
         VALUES (?1, ?2, ?3, ?3, 1)",
        params![session_id, event, now],
    )?;
    if rows == 0 {
        conn.execute(
            "UPDATE hook_markers SET last_at = ?1, fire_count = fire_count + 1
             WHERE session_id = ?2 AND event = ?3",
            params![now, session_id, event],
        )?;
    }
    Ok(rows > 0)
}

/// Record that `event` fired for the session, creating or bumping its marker.
pub fn touch(conn: &Connection, session_id: &str, event: &str) -> Result<()> {
    claim(conn, session_id, event)?;
    Ok(())
}

pub fn has_fired(conn: &Connection, session_id: &str, event: &str) -> Result<bool> {
    let fired: bool = conn.query_row(
        "SELECT COUNT(*) > 0 FROM hook_markers WHERE session_id = ?1 AND event = ?2",
        params![session_id, event],
        |row| row.get(0),
    )?;
    Ok(fired)
}

/// How many times `event` fired for the session (0 if never).
pub fn fire_count(conn: &Connection, session_id: &str, event: &str) -> Result<u32> {
    let count: i64 = conn.query_row(
        "SELECT COALESCE(MAX(fire_count), 0) FROM hook_markers WHERE session_id = ?1 AND event = ?2",
        params![session_id, event],
        |row| row.get(0),
    )?;
    Ok(count as u32)
}
