//! Append-only deployment audit trail. Rows are never updated or deleted.

use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{DeployOutcome, DeploymentRecord};

/// Append a deployment row. Returns the new row id.
pub fn record_deployment(
    conn: &Connection,
    project: &str,
    artifact_kind: &str,
    artifact_path: &str,
    content_hash: &str,
    outcome: DeployOutcome,
    detail: Option<&str>,
) -> Result<i64> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO deployments (project, artifact_kind, artifact_path, content_hash, outcome, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![project, artifact_kind, artifact_path, content_hash, outcome.as_str(), detail, now],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Deployments newest first, optionally for one project.
pub fn list_deployments(
    conn: &Connection,
    project: Option<&str>,
    limit: usize,
) -> Result<Vec<DeploymentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{SELECT_DEPLOYMENT} WHERE (?1 IS NULL OR project = ?1) ORDER BY id DESC LIMIT ?2"
    ))?;
    let records = stmt
        .query_map(params![project, limit as i64], deployment_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

/// Most recent successful (written or unchanged) deployment for a project.
pub fn latest_successful(conn: &Connection, project: &str) -> Result<Option<DeploymentRecord>> {
    let record = conn
        .query_row(
            &format!(
                "{SELECT_DEPLOYMENT} WHERE project = ?1 AND outcome != 'failed' ORDER BY id DESC LIMIT 1"
            ),
            params![project],
            deployment_from_row,
        )
        .optional()?;
    Ok(record)
}

const SELECT_DEPLOYMENT: &str = "SELECT id, project, artifact_kind, artifact_path, content_hash, outcome, detail, created_at FROM deployments";

fn deployment_from_row(row: &Row<'_>) -> rusqlite::Result<DeploymentRecord> {
    let outcome: String = row.get(5)?;
    let outcome = outcome.parse::<DeployOutcome>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
    })?;
    Ok(DeploymentRecord {
        id: row.get(0)?,
        project: row.get(1)?,
        artifact_kind: row.get(2)?,
        artifact_path: row.get(3)?,
        content_hash: row.get(4)?,
        outcome,
        detail: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_listed_newest_first() {
        let conn = crate::db::open_memory_database().unwrap();
        record_deployment(&conn, "alpha", "settings", "/a", "h1", DeployOutcome::Written, None).unwrap();
        record_deployment(&conn, "alpha", "settings", "/a", "h1", DeployOutcome::Unchanged, None).unwrap();
        record_deployment(&conn, "beta", "settings", "/b", "h2", DeployOutcome::Written, None).unwrap();

        let alpha = list_deployments(&conn, Some("alpha"), 10).unwrap();
        assert_eq!(alpha.len(), 2);
        assert_eq!(alpha[0].outcome, DeployOutcome::Unchanged);
        assert_eq!(list_deployments(&conn, None, 10).unwrap().len(), 3);
    }

    #[test]
    fn latest_successful_skips_failures() {
        let conn = crate::db::open_memory_database().unwrap();
        record_deployment(&conn, "alpha", "settings", "/a", "good", DeployOutcome::Written, None).unwrap();
        record_deployment(&conn, "alpha", "settings", "/a", "bad", DeployOutcome::Failed, Some("disk full"))
            .unwrap();

        let latest = latest_successful(&conn, "alpha").unwrap().unwrap();
        assert_eq!(latest.content_hash, "good");
        assert!(latest_successful(&conn, "beta").unwrap().is_none());
    }
}
