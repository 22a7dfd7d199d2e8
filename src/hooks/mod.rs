//! Lifecycle hook handling: one host event in, one JSON response out.
//!
//! [`run_hook`] is the process entry point. It never fails on bad input: an
//! unparseable event, an unreachable database or a broken knowledge service all
//! degrade to a smaller (possibly empty) response.

pub mod callbacks;
pub mod event;
pub mod orchestrator;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::config::ConductorConfig;
use crate::db::{self, SharedDb};
use crate::knowledge::{self, KnowledgeLookup, NoLookup};
use crate::store::projects;
use event::{HookInput, HookOutput};
use orchestrator::{HookContext, Orchestrator};

/// Parse one event. `None` (with a warning) if the payload is not a hook event.
pub fn parse_input(raw: &str) -> Option<HookInput> {
    match serde_json::from_str::<HookInput>(raw) {
        Ok(input) if !input.session_id.is_empty() => Some(input),
        Ok(input) => {
            tracing::warn!(event = %input.hook_event_name, "hook input has no session_id");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "hook input is not valid JSON");
            None
        }
    }
}

/// Project for a working directory: the registered project at that path, or
/// the directory's name.
pub async fn resolve_project(db: Option<&SharedDb>, cwd: &Path) -> String {
    let fallback = cwd
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string());

    let Some(db) = db.cloned() else {
        return fallback;
    };
    let path = cwd.to_string_lossy().into_owned();
    let registered = tokio::task::spawn_blocking(move || {
        let conn = db.lock().unwrap_or_else(PoisonError::into_inner);
        projects::project_for_path(&conn, &path)
    })
    .await;

    match registered {
        Ok(Ok(Some(name))) => name,
        Ok(Ok(None)) => fallback,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "project lookup failed, using directory name");
            fallback
        }
        Err(e) => {
            tracing::warn!(error = %e, "project lookup task failed, using directory name");
            fallback
        }
    }
}

/// Build the per-event context.
pub async fn build_context(
    config: Arc<ConductorConfig>,
    db: Option<SharedDb>,
    lookup: Arc<dyn KnowledgeLookup>,
    input: &HookInput,
) -> HookContext {
    let cwd = input
        .cwd
        .as_deref()
        .map(PathBuf::from)
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."));
    let project = resolve_project(db.as_ref(), &cwd).await;
    HookContext {
        session_id: input.session_id.clone(),
        project,
        cwd,
        config,
        db,
        lookup,
    }
}

/// Dispatch one parsed event and fold the result into a response.
pub async fn handle(
    orch: &Orchestrator,
    config: Arc<ConductorConfig>,
    db: Option<SharedDb>,
    lookup: Arc<dyn KnowledgeLookup>,
    input: &HookInput,
) -> HookOutput {
    let ctx = build_context(config, db, lookup, input).await;
    orch.dispatch(&ctx, input).await.to_output()
}

/// Read one event from stdin, dispatch it, and write the response to stdout.
pub async fn run_hook(config: ConductorConfig) -> Result<()> {
    let mut raw = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut raw).await {
        tracing::warn!(error = %e, "failed to read hook input");
    }

    let output = match parse_input(&raw) {
        Some(input) => {
            let config = Arc::new(config);
            let db = open_shared(&config);
            let lookup = knowledge::create_lookup(&config.knowledge).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "knowledge lookup disabled");
                Arc::new(NoLookup)
            });
            let orch = callbacks::default_orchestrator(&config);
            handle(&orch, config, db, lookup, &input).await
        }
        None => HookOutput::empty(),
    };

    let mut json = serde_json::to_string(&output).context("failed to serialize hook output")?;
    json.push('\n');
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(json.as_bytes())
        .await
        .context("failed to write hook output")?;
    stdout.flush().await.context("failed to flush hook output")?;
    Ok(())
}

fn open_shared(config: &ConductorConfig) -> Option<SharedDb> {
    let path = config.resolved_db_path();
    match db::open_database(&path) {
        Ok(conn) => Some(db::shared(conn)),
        Err(e) => {
            tracing::error!(
                path = %path.display(),
                error = %format!("{e:#}"),
                "database unavailable, running without it"
            );
            None
        }
    }
}
