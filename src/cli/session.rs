//! CLI `session` and `state` commands.

use anyhow::{bail, Result};

use conductor::config::ConductorConfig;
use conductor::store::sessions::{self, CloseReport};
use conductor::store::state::{self, Checkpoint};

pub struct EndArgs<'a> {
    pub session: &'a str,
    pub summary: Option<String>,
    pub done: Vec<String>,
    pub learned: Vec<String>,
    pub focus: Option<&'a str>,
    pub next: Vec<String>,
}

/// Explicitly close a session, optionally handing off focus and next steps.
pub fn end(config: &ConductorConfig, args: EndArgs<'_>) -> Result<()> {
    let mut conn = super::open_db(config)?;
    let report = CloseReport {
        summary: args.summary.unwrap_or_default(),
        completed_work: args.done,
        learnings: args.learned,
    };
    let session = sessions::close_with_handoff(
        &mut conn,
        args.session,
        &report,
        args.focus,
        &args.next,
    )?;

    println!(
        "Closed session {} ({}) at {}",
        session.id,
        session.project,
        session.ended_at.as_deref().unwrap_or("?")
    );
    if args.focus.is_some() || !args.next.is_empty() {
        println!("Session state for {} updated.", session.project);
    }
    Ok(())
}

pub fn list(config: &ConductorConfig, project: Option<&str>, open_only: bool, limit: usize) -> Result<()> {
    let conn = super::open_db(config)?;
    let rows = sessions::list_sessions(&conn, project, open_only, limit)?;
    if rows.is_empty() {
        println!("No sessions.");
        return Ok(());
    }

    println!("{:<38} {:<16} {:<12} {:<26} STATUS", "ID", "PROJECT", "IDENTITY", "STARTED");
    for s in rows {
        let status = match (&s.ended_at, s.summary.as_deref()) {
            (None, _) => "open".to_string(),
            (Some(_), Some(summary)) if !summary.is_empty() => format!("closed: {summary}"),
            (Some(_), _) => "closed".to_string(),
        };
        println!(
            "{:<38} {:<16} {:<12} {:<26} {}",
            s.id, s.project, s.identity, s.started_at, status
        );
    }
    Ok(())
}

pub fn show_state(config: &ConductorConfig, project: &str) -> Result<()> {
    let conn = super::open_db(config)?;
    match state::get_state(&conn, project)? {
        Some(saved) => println!("{}", serde_json::to_string_pretty(&saved)?),
        None => println!("No session state for {project}."),
    }
    Ok(())
}

pub fn set_state(
    config: &ConductorConfig,
    project: &str,
    focus: Option<&str>,
    next: &[String],
    expect_revision: Option<i64>,
) -> Result<()> {
    let mut conn = super::open_db(config)?;
    let cp = Checkpoint {
        current_focus: focus,
        next_steps: next,
        updated_by: None,
    };
    let revision = match expect_revision {
        None => state::checkpoint(&conn, project, &cp)?,
        Some(expected) => match state::checkpoint_if_revision(&mut conn, project, expected, &cp)? {
            Some(revision) => revision,
            None => bail!("session state for {project} changed since revision {expected}; re-read and retry"),
        },
    };
    println!("Session state for {project} saved (revision {revision}).");
    Ok(())
}
