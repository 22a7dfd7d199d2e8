#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use conductor::config::ConductorConfig;
use conductor::db::{self, SharedDb};
use conductor::hooks::event::{HookInput, HookOutput};
use conductor::hooks::{self, callbacks};
use conductor::knowledge::{KnowledgeLookup, NoLookup};
use conductor::store::types::{ProjectTypeDefaults, TemplateKind};
use conductor::store::{projects, templates};
use rusqlite::Connection;
use serde_json::{json, Value};

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let mut conn = Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&mut conn).unwrap();
    conn
}

/// The hook-set template every seeded project type starts from.
pub fn base_template() -> Value {
    json!({
        "hooks": {
            "SessionStart": [{"hooks": [{"type": "command", "command": "conductor hook"}]}],
            "PreToolUse": [{"matcher": "Write|Edit|MultiEdit", "hooks": [{"type": "command", "command": "conductor hook"}]}]
        },
        "enabledMcpjsonServers": ["postgres"],
        "permissions": {"allow": ["y"]}
    })
}

/// Seed template `base`, project type `service` (capabilities `a`, `b`) and
/// project `name` rooted at `path`.
pub fn seed_project(conn: &Connection, name: &str, path: Option<&Path>) {
    templates::put_template(conn, "base", TemplateKind::HookSet, None, &base_template()).unwrap();
    projects::set_type_defaults(
        conn,
        &ProjectTypeDefaults {
            project_type: "service".into(),
            template: "base".into(),
            services: vec!["vault".into()],
            capabilities: vec!["a".into(), "b".into()],
            instructions: vec![],
        },
    )
    .unwrap();
    let path = path.map(|p| p.to_string_lossy().into_owned());
    projects::upsert_project(conn, name, "service", path.as_deref()).unwrap();
}

pub fn input(event: &str, session_id: &str, cwd: &Path) -> HookInput {
    HookInput {
        hook_event_name: event.into(),
        session_id: session_id.into(),
        cwd: Some(cwd.to_string_lossy().into_owned()),
        ..Default::default()
    }
}

pub fn tool_input(event: &str, session_id: &str, cwd: &Path, tool: &str, file: &str) -> HookInput {
    HookInput {
        tool_name: Some(tool.into()),
        tool_input: Some(json!({"file_path": file})),
        ..input(event, session_id, cwd)
    }
}

/// Dispatch one event through the default callbacks.
pub async fn fire(db: Option<SharedDb>, input: &HookInput) -> HookOutput {
    fire_with(db, Arc::new(NoLookup), ConductorConfig::default(), input).await
}

pub async fn fire_with(
    db: Option<SharedDb>,
    lookup: Arc<dyn KnowledgeLookup>,
    config: ConductorConfig,
    input: &HookInput,
) -> HookOutput {
    let orch = callbacks::default_orchestrator(&config);
    hooks::handle(&orch, Arc::new(config), db, lookup, input).await
}

pub fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}
