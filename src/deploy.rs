//! Deployment writer: materialize a synthesized document and log the attempt.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::ConductorConfig;
use crate::store::deployments;
use crate::store::types::DeployOutcome;
use crate::synth::{self, SynthesizedConfig};

/// Result of one successful deployment.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub project: String,
    pub artifact_path: PathBuf,
    pub hash: String,
    pub outcome: DeployOutcome,
    pub record_id: i64,
}

/// Write `bytes` to `path` through a temp file in the same directory and an
/// atomic rename. Creates the parent directory if needed.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;
    temp.write_all(bytes).context("failed to write temp file")?;
    temp.as_file().sync_all().context("failed to sync temp file")?;
    temp.persist(path)
        .with_context(|| format!("failed to rename temp file over {}", path.display()))?;
    Ok(())
}

/// Hash of the file currently at `path`, if it can be read.
pub fn existing_hash(path: &Path) -> Option<String> {
    std::fs::read(path).ok().map(|bytes| synth::content_hash(&bytes))
}

/// Write a synthesized document and append a deployment record.
///
/// The file is rewritten even when its hash already matches; the record then
/// says `unchanged`. A filesystem failure appends a `failed` record and is
/// returned to the caller with the previous artifact left in place.
pub fn deploy(
    conn: &Connection,
    config: &ConductorConfig,
    synthesized: &SynthesizedConfig,
    artifact_path: &Path,
) -> Result<Deployment> {
    let path_str = artifact_path.to_string_lossy();
    let kind = config.deploy.artifact_kind.as_str();
    let previous = existing_hash(artifact_path);

    if let Err(e) = write_atomic(artifact_path, &synthesized.bytes) {
        let detail = format!("{e:#}");
        tracing::error!(
            project = %synthesized.project,
            path = %path_str,
            error = %detail,
            "artifact write failed"
        );
        record_failure(conn, &synthesized.project, kind, &path_str, &synthesized.hash, &detail);
        return Err(e);
    }

    let outcome = if previous.as_deref() == Some(synthesized.hash.as_str()) {
        DeployOutcome::Unchanged
    } else {
        DeployOutcome::Written
    };

    let record_id = deployments::record_deployment(
        conn,
        &synthesized.project,
        kind,
        &path_str,
        &synthesized.hash,
        outcome,
        None,
    )?;

    tracing::info!(
        project = %synthesized.project,
        path = %path_str,
        hash = %synthesized.hash,
        outcome = %outcome,
        "artifact deployed"
    );

    Ok(Deployment {
        project: synthesized.project.clone(),
        artifact_path: artifact_path.to_path_buf(),
        hash: synthesized.hash.clone(),
        outcome,
        record_id,
    })
}

/// Resynthesize `project` and deploy it under `project_dir`.
///
/// Configuration errors are recorded as `failed` deployments and returned;
/// the artifact on disk is not touched.
pub fn resync(
    conn: &Connection,
    config: &ConductorConfig,
    project: &str,
    project_dir: &Path,
) -> Result<Deployment> {
    let artifact_path = config.artifact_path_for(project_dir);
    let synthesized = match synth::synthesize_project(conn, project, &artifact_path) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(project, error = %e, "synthesis aborted");
            record_failure(
                conn,
                project,
                &config.deploy.artifact_kind,
                &artifact_path.to_string_lossy(),
                "",
                &format!("{e:#}"),
            );
            return Err(e);
        }
    };
    deploy(conn, config, &synthesized, &artifact_path)
}

fn record_failure(
    conn: &Connection,
    project: &str,
    kind: &str,
    path: &str,
    hash: &str,
    detail: &str,
) {
    if let Err(e) = deployments::record_deployment(
        conn,
        project,
        kind,
        path,
        hash,
        DeployOutcome::Failed,
        Some(detail),
    ) {
        tracing::warn!(project, error = %e, "could not record failed deployment");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{projects, templates};
    use crate::store::types::{ProjectTypeDefaults, TemplateKind};
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded() -> Connection {
        let conn = crate::db::open_memory_database().unwrap();
        templates::put_template(
            &conn,
            "base",
            TemplateKind::HookSet,
            None,
            &json!({"enabledMcpjsonServers": ["postgres"]}),
        )
        .unwrap();
        projects::set_type_defaults(
            &conn,
            &ProjectTypeDefaults {
                project_type: "service".into(),
                template: "base".into(),
                ..Default::default()
            },
        )
        .unwrap();
        projects::upsert_project(&conn, "alpha", "service", None).unwrap();
        conn
    }

    #[test]
    fn second_deploy_is_unchanged() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        let config = ConductorConfig::default();

        let first = resync(&conn, &config, "alpha", dir.path()).unwrap();
        assert_eq!(first.outcome, DeployOutcome::Written);
        assert!(first.artifact_path.ends_with(".claude/settings.local.json"));

        let second = resync(&conn, &config, "alpha", dir.path()).unwrap();
        assert_eq!(second.outcome, DeployOutcome::Unchanged);
        assert_eq!(first.hash, second.hash);
        assert_eq!(existing_hash(&second.artifact_path).as_deref(), Some(second.hash.as_str()));
    }

    #[test]
    fn corrupted_artifact_is_healed() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        let config = ConductorConfig::default();
        let first = resync(&conn, &config, "alpha", dir.path()).unwrap();

        std::fs::write(&first.artifact_path, "{ garbage").unwrap();
        let healed = resync(&conn, &config, "alpha", dir.path()).unwrap();
        assert_eq!(healed.outcome, DeployOutcome::Written);
        assert_eq!(healed.hash, first.hash);
    }

    #[test]
    fn configuration_error_leaves_artifact_and_records_failure() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        let config = ConductorConfig::default();
        let good = resync(&conn, &config, "alpha", dir.path()).unwrap();
        let before = std::fs::read(&good.artifact_path).unwrap();

        projects::set_override(&conn, "alpha", &json!({"skills": 7})).unwrap();
        let err = resync(&conn, &config, "alpha", dir.path()).unwrap_err();
        assert!(crate::synth::error::is_configuration_error(&err));

        assert_eq!(std::fs::read(&good.artifact_path).unwrap(), before);
        let records = deployments::list_deployments(&conn, Some("alpha"), 10).unwrap();
        assert_eq!(records[0].outcome, DeployOutcome::Failed);
        assert!(records[0].detail.is_some());
    }

    #[test]
    fn write_failure_is_reported_and_recorded() {
        let conn = seeded();
        let dir = TempDir::new().unwrap();
        // A regular file where the artifact directory should be.
        std::fs::write(dir.path().join(".claude"), "not a directory").unwrap();

        let err = resync(&conn, &ConductorConfig::default(), "alpha", dir.path());
        assert!(err.is_err());
        let records = deployments::list_deployments(&conn, Some("alpha"), 10).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, DeployOutcome::Failed);
    }
}
