//! SQL DDL for all conductor tables.
//!
//! Configuration sources (`templates`, `project_types`, `projects`,
//! `project_overrides`, `standards`), lifecycle records (`sessions`,
//! `session_state`, `hook_markers`), audit trails (`deployments`,
//! `knowledge_usage`, `tool_usage`) and `schema_meta`. All DDL uses
//! `IF NOT EXISTS` for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the version-1 layout.
const SCHEMA_SQL: &str = r#"
-- Reusable configuration fragments
CREATE TABLE IF NOT EXISTS templates (
    name TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK(kind IN ('hook-set','tool-permissions','service-bindings')),
    parent TEXT,
    content TEXT NOT NULL,
    version INTEGER NOT NULL DEFAULT 1,
    updated_at TEXT NOT NULL
);

-- Per-type defaults; list columns hold JSON arrays
CREATE TABLE IF NOT EXISTS project_types (
    project_type TEXT PRIMARY KEY,
    template TEXT NOT NULL,
    default_services TEXT NOT NULL DEFAULT '[]',
    default_capabilities TEXT NOT NULL DEFAULT '[]',
    default_instructions TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS projects (
    name TEXT PRIMARY KEY,
    project_type TEXT NOT NULL,
    path TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS project_overrides (
    project TEXT PRIMARY KEY REFERENCES projects(name) ON DELETE CASCADE,
    content TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Append-only deployment audit trail
CREATE TABLE IF NOT EXISTS deployments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project TEXT NOT NULL,
    artifact_kind TEXT NOT NULL,
    artifact_path TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    outcome TEXT NOT NULL CHECK(outcome IN ('written','unchanged','failed')),
    detail TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_deployments_project ON deployments(project);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    identity TEXT NOT NULL,
    project TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    summary TEXT,
    completed_work TEXT,
    learnings TEXT
);

CREATE INDEX IF NOT EXISTS idx_sessions_identity ON sessions(identity);
CREATE INDEX IF NOT EXISTS idx_sessions_project ON sessions(project);
CREATE INDEX IF NOT EXISTS idx_sessions_open ON sessions(ended_at);

-- One row per project: where work was left
CREATE TABLE IF NOT EXISTS session_state (
    project TEXT PRIMARY KEY,
    current_focus TEXT,
    next_steps TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL,
    updated_by TEXT
);

-- Which lifecycle events fired for which session
CREATE TABLE IF NOT EXISTS hook_markers (
    session_id TEXT NOT NULL,
    event TEXT NOT NULL,
    first_at TEXT NOT NULL,
    last_at TEXT NOT NULL,
    fire_count INTEGER NOT NULL DEFAULT 1,
    PRIMARY KEY (session_id, event)
);

CREATE TABLE IF NOT EXISTS knowledge_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    project TEXT,
    query TEXT NOT NULL,
    result_count INTEGER NOT NULL,
    top_similarity REAL,
    latency_ms INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tool_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT,
    project TEXT,
    tool_name TEXT NOT NULL,
    service TEXT,
    success INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS standards (
    name TEXT PRIMARY KEY,
    path_pattern TEXT NOT NULL,
    guidance TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 100,
    active INTEGER NOT NULL DEFAULT 1
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creates_all_tables() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "templates",
            "project_types",
            "projects",
            "project_overrides",
            "deployments",
            "sessions",
            "session_state",
            "hook_markers",
            "knowledge_usage",
            "tool_usage",
            "standards",
            "schema_meta",
        ] {
            assert!(tables.contains(&expected.to_string()), "{expected} table missing");
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn deployment_outcome_is_checked() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let result = conn.execute(
            "INSERT INTO deployments (project, artifact_kind, artifact_path, content_hash, outcome, created_at)
             VALUES ('p', 'settings', '/x', 'abc', 'exploded', '2024-01-01T00:00:00Z')",
            [],
        );
        assert!(result.is_err(), "unknown outcome should be rejected by CHECK constraint");
    }
}
