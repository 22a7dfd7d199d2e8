//! CLI commands that edit configuration sources: templates, projects, project
//! types and overrides. Plus the deployment log.

use anyhow::{Context, Result};
use std::path::Path;

use conductor::config::ConductorConfig;
use conductor::store::types::{ProjectTypeDefaults, TemplateKind};
use conductor::store::{deployments, projects, templates};

fn read_json(file: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("{} is not valid JSON", file.display()))
}

pub fn put_template(
    config: &ConductorConfig,
    name: &str,
    kind: TemplateKind,
    parent: Option<&str>,
    file: &Path,
) -> Result<()> {
    let content = read_json(file)?;
    let conn = super::open_db(config)?;
    let version = templates::put_template(&conn, name, kind, parent, &content)?;
    println!("Template {name} ({kind}) saved as version {version}.");
    Ok(())
}

pub fn list_templates(config: &ConductorConfig) -> Result<()> {
    let conn = super::open_db(config)?;
    let all = templates::list_templates(&conn)?;
    if all.is_empty() {
        println!("No templates.");
        return Ok(());
    }
    println!("{:<24} {:<18} {:<24} {:>7}  UPDATED", "NAME", "KIND", "PARENT", "VERSION");
    for t in all {
        println!(
            "{:<24} {:<18} {:<24} {:>7}  {}",
            t.name,
            t.kind,
            t.parent.as_deref().unwrap_or("-"),
            t.version,
            t.updated_at
        );
    }
    Ok(())
}

pub fn add_project(
    config: &ConductorConfig,
    name: &str,
    project_type: &str,
    path: Option<&Path>,
) -> Result<()> {
    let conn = super::open_db(config)?;
    let path = path.map(|p| p.to_string_lossy().into_owned());
    projects::upsert_project(&conn, name, project_type, path.as_deref())?;
    if projects::get_type_defaults(&conn, project_type)?.is_none() {
        println!("Warning: project type {project_type} has no defaults yet; synthesis will fail until `conductor project type {project_type}` is run.");
    }
    println!("Project {name} registered as {project_type}.");
    Ok(())
}

/// Replace a project's override document. An empty object clears it.
pub fn set_override(config: &ConductorConfig, project: &str, file: &Path) -> Result<()> {
    let content = read_json(file)?;
    let conn = super::open_db(config)?;
    if content.as_object().is_some_and(|o| o.is_empty()) {
        let removed = projects::clear_override(&conn, project)?;
        println!(
            "Override for {project} {}.",
            if removed { "cleared" } else { "was not set" }
        );
        return Ok(());
    }
    projects::set_override(&conn, project, &content)?;
    println!("Override for {project} saved.");
    Ok(())
}

pub fn set_type(
    config: &ConductorConfig,
    project_type: &str,
    template: &str,
    services: Vec<String>,
    capabilities: Vec<String>,
    instructions: Vec<String>,
) -> Result<()> {
    let conn = super::open_db(config)?;
    if templates::get_template(&conn, template)?.is_none() {
        println!("Warning: template {template} does not exist yet.");
    }
    projects::set_type_defaults(
        &conn,
        &ProjectTypeDefaults {
            project_type: project_type.to_string(),
            template: template.to_string(),
            services,
            capabilities,
            instructions,
        },
    )?;
    println!("Defaults for project type {project_type} saved.");
    Ok(())
}

pub fn list_deployments(config: &ConductorConfig, project: Option<&str>, limit: usize) -> Result<()> {
    let conn = super::open_db(config)?;
    let records = deployments::list_deployments(&conn, project, limit)?;
    if records.is_empty() {
        println!("No deployments.");
        return Ok(());
    }
    println!("{:<26} {:<16} {:<10} {:<14} PATH", "WHEN", "PROJECT", "OUTCOME", "HASH");
    for r in records {
        let short_hash: String = r.content_hash.chars().take(12).collect();
        println!(
            "{:<26} {:<16} {:<10} {:<14} {}",
            r.created_at, r.project, r.outcome, short_hash, r.artifact_path
        );
        if let Some(detail) = r.detail {
            println!("{:<26} {detail}", "");
        }
    }
    Ok(())
}
