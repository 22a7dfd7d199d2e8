//! Session record lifecycle: open on start, closed exactly once.
//!
//! A session is either open (`ended_at IS NULL`) or closed. Closing is one-way;
//! a new start always creates a new row. Implicit closes (the end event) never
//! overwrite a summary supplied by an explicit close.

use anyhow::{bail, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::state;
use super::types::Session;

/// Outcome lists supplied by an explicit end-of-session action.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CloseReport {
    pub summary: String,
    pub completed_work: Vec<String>,
    pub learnings: Vec<String>,
}

/// Create an open session row. Returns `false` if a row with this id already
/// exists (the row is left untouched).
pub fn open_session(conn: &Connection, id: &str, identity: &str, project: &str) -> Result<bool> {
    let now = chrono::Utc::now().to_rfc3339();
    let rows = conn.execute(
        "INSERT OR IGNORE INTO sessions (id, identity, project, started_at) VALUES (?1, ?2, ?3, ?4)",
        params![id, identity, project, now],
    )?;
    if rows > 0 {
        tracing::info!(session_id = id, identity, project, "session opened");
    }
    Ok(rows > 0)
}

pub fn get_session(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let session = conn
        .query_row(
            &format!("{SELECT_SESSION} WHERE id = ?1"),
            params![id],
            session_from_row,
        )
        .optional()?;
    Ok(session)
}

/// Open sessions for an identity, newest first, excluding `except_id`.
pub fn open_sessions_for_identity(
    conn: &Connection,
    identity: &str,
    except_id: &str,
) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_SESSION} WHERE identity = ?1 AND id != ?2 AND ended_at IS NULL ORDER BY started_at DESC"
    ))?;
    let sessions = stmt
        .query_map(params![identity, except_id], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

/// Sessions newest first, optionally filtered by project and open state.
pub fn list_sessions(
    conn: &Connection,
    project: Option<&str>,
    open_only: bool,
    limit: usize,
) -> Result<Vec<Session>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_SESSION}
         WHERE (?1 IS NULL OR project = ?1) AND (?2 = 0 OR ended_at IS NULL)
         ORDER BY started_at DESC LIMIT ?3"
    ))?;
    let sessions = stmt
        .query_map(params![project, open_only, limit as i64], session_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(sessions)
}

/// Explicit close with a summary and outcome lists. Fails if the session does not
/// exist or is already closed.
pub fn close_session(conn: &Connection, id: &str, report: &CloseReport) -> Result<Session> {
    let Some(session) = get_session(conn, id)? else {
        bail!("session not found: {id}");
    };
    if !session.is_open() {
        bail!("session already closed: {id}");
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "UPDATE sessions
         SET ended_at = ?1, summary = ?2, completed_work = ?3, learnings = ?4
         WHERE id = ?5 AND ended_at IS NULL",
        params![
            now,
            report.summary,
            serde_json::to_string(&report.completed_work)?,
            serde_json::to_string(&report.learnings)?,
            id,
        ],
    )?;
    tracing::info!(session_id = id, "session closed");

    get_session(conn, id)?.ok_or_else(|| anyhow::anyhow!("session vanished during close: {id}"))
}

/// Explicit close that also checkpoints the project's [`SessionState`] when a
/// next focus or next steps are given. Both writes share one transaction.
///
/// [`SessionState`]: super::types::SessionState
pub fn close_with_handoff(
    conn: &mut Connection,
    id: &str,
    report: &CloseReport,
    next_focus: Option<&str>,
    next_steps: &[String],
) -> Result<Session> {
    let tx = conn.transaction()?;
    let session = close_session(&tx, id, report)?;
    if next_focus.is_some() || !next_steps.is_empty() {
        state::checkpoint(
            &tx,
            &session.project,
            &state::Checkpoint {
                current_focus: next_focus,
                next_steps,
                updated_by: Some(id),
            },
        )?;
    }
    tx.commit()?;
    Ok(session)
}

/// Implicit close from the end event. Keeps any existing summary, otherwise stores
/// an empty one. Returns `false` if the session was missing or already closed.
pub fn close_session_implicit(conn: &Connection, id: &str) -> Result<bool> {
    let now = chrono::Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE sessions
         SET ended_at = ?1, summary = COALESCE(summary, ''),
             completed_work = COALESCE(completed_work, '[]'), learnings = COALESCE(learnings, '[]')
         WHERE id = ?2 AND ended_at IS NULL",
        params![now, id],
    )?;
    Ok(rows > 0)
}

/// Close open sessions of `project` that started before `cutoff` (RFC 3339),
/// excluding `except_id`. Returns the number of sessions closed.
pub fn close_abandoned(
    conn: &Connection,
    project: &str,
    cutoff: &str,
    except_id: &str,
) -> Result<usize> {
    let now = chrono::Utc::now().to_rfc3339();
    let rows = conn.execute(
        "UPDATE sessions
         SET ended_at = ?1, summary = COALESCE(summary, 'abandoned'),
             completed_work = COALESCE(completed_work, '[]'), learnings = COALESCE(learnings, '[]')
         WHERE project = ?2 AND id != ?3 AND ended_at IS NULL AND started_at < ?4",
        params![now, project, except_id, cutoff],
    )?;
    if rows > 0 {
        tracing::info!(project, closed = rows, "closed abandoned sessions");
    }
    Ok(rows)
}

const SELECT_SESSION: &str = "SELECT id, identity, project, started_at, ended_at, summary, completed_work, learnings FROM sessions";

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let completed: Option<String> = row.get(6)?;
    let learnings: Option<String> = row.get(7)?;
    Ok(Session {
        id: row.get(0)?,
        identity: row.get(1)?,
        project: row.get(2)?,
        started_at: row.get(3)?,
        ended_at: row.get(4)?,
        summary: row.get(5)?,
        completed_work: parse_list(completed.as_deref()),
        learnings: parse_list(learnings.as_deref()),
    })
}

fn parse_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_is_idempotent_per_id() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(open_session(&conn, "s1", "me", "alpha").unwrap());
        assert!(!open_session(&conn, "s1", "me", "alpha").unwrap());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn explicit_close_records_outcomes() {
        let conn = crate::db::open_memory_database().unwrap();
        open_session(&conn, "s1", "me", "alpha").unwrap();

        let report = CloseReport {
            summary: "wired the writer".into(),
            completed_work: vec!["writer".into()],
            learnings: vec!["rename is atomic".into()],
        };
        let session = close_session(&conn, "s1", &report).unwrap();
        assert!(!session.is_open());
        assert_eq!(session.summary.as_deref(), Some("wired the writer"));
        assert_eq!(session.completed_work, vec!["writer".to_string()]);

        // no reopening, no double close
        assert!(close_session(&conn, "s1", &report).is_err());
        assert!(!close_session_implicit(&conn, "s1").unwrap());
    }

    #[test]
    fn handoff_close_updates_project_state() {
        let mut conn = crate::db::open_memory_database().unwrap();
        open_session(&conn, "s1", "me", "alpha").unwrap();

        let steps = vec!["review merge".to_string()];
        close_with_handoff(&mut conn, "s1", &CloseReport::default(), Some("deploy"), &steps)
            .unwrap();

        let saved = state::get_state(&conn, "alpha").unwrap().unwrap();
        assert_eq!(saved.current_focus.as_deref(), Some("deploy"));
        assert_eq!(saved.next_steps, steps);
        assert_eq!(saved.updated_by.as_deref(), Some("s1"));
    }

    #[test]
    fn failed_handoff_close_leaves_state_alone() {
        let mut conn = crate::db::open_memory_database().unwrap();
        let steps = vec!["x".to_string()];
        assert!(close_with_handoff(&mut conn, "missing", &CloseReport::default(), None, &steps)
            .is_err());
        assert!(state::get_state(&conn, "alpha").unwrap().is_none());
    }

    #[test]
    fn implicit_close_uses_empty_summary() {
        let conn = crate::db::open_memory_database().unwrap();
        open_session(&conn, "s1", "me", "alpha").unwrap();
        assert!(close_session_implicit(&conn, "s1").unwrap());

        let session = get_session(&conn, "s1").unwrap().unwrap();
        assert!(!session.is_open());
        assert_eq!(session.summary.as_deref(), Some(""));
        assert!(session.learnings.is_empty());
    }

    #[test]
    fn close_unknown_session_fails() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(close_session(&conn, "ghost", &CloseReport::default()).is_err());
        assert!(!close_session_implicit(&conn, "ghost").unwrap());
    }

    #[test]
    fn abandoned_sessions_are_swept() {
        let conn = crate::db::open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO sessions (id, identity, project, started_at) VALUES ('old', 'me', 'alpha', '2020-01-01T00:00:00+00:00')",
            [],
        )
        .unwrap();
        open_session(&conn, "new", "me", "alpha").unwrap();

        let cutoff = (chrono::Utc::now() - chrono::Duration::hours(24)).to_rfc3339();
        assert_eq!(close_abandoned(&conn, "alpha", &cutoff, "new").unwrap(), 1);

        let old = get_session(&conn, "old").unwrap().unwrap();
        assert_eq!(old.summary.as_deref(), Some("abandoned"));
        assert!(get_session(&conn, "new").unwrap().unwrap().is_open());
    }

    #[test]
    fn lists_open_sessions_for_identity() {
        let conn = crate::db::open_memory_database().unwrap();
        open_session(&conn, "s1", "me", "alpha").unwrap();
        open_session(&conn, "s2", "me", "beta").unwrap();
        open_session(&conn, "s3", "you", "beta").unwrap();

        let others = open_sessions_for_identity(&conn, "me", "s2").unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, "s1");

        assert_eq!(list_sessions(&conn, Some("beta"), true, 10).unwrap().len(), 2);
        assert_eq!(list_sessions(&conn, None, false, 10).unwrap().len(), 3);
    }
}
