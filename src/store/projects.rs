//! Project registry, per-type defaults, and per-project override documents.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::types::{Project, ProjectTypeDefaults};

/// Register a project or update its type and path.
pub fn upsert_project(
    conn: &Connection,
    name: &str,
    project_type: &str,
    path: Option<&str>,
) -> Result<()> {
    if name.trim().is_empty() {
        bail!("project name must not be empty");
    }
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO projects (name, project_type, path, created_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
             project_type = excluded.project_type,
             path = COALESCE(excluded.path, projects.path)",
        params![name, project_type, path, now],
    )?;
    Ok(())
}

pub fn get_project(conn: &Connection, name: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT name, project_type, path, created_at FROM projects WHERE name = ?1",
            params![name],
            |row| {
                Ok(Project {
                    name: row.get(0)?,
                    project_type: row.get(1)?,
                    path: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(project)
}

/// Name of the project registered at `path`, if any.
pub fn project_for_path(conn: &Connection, path: &str) -> Result<Option<String>> {
    let name = conn
        .query_row(
            "SELECT name FROM projects WHERE path = ?1 ORDER BY name LIMIT 1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(name)
}

/// Insert or replace the defaults for a project type.
pub fn set_type_defaults(conn: &Connection, defaults: &ProjectTypeDefaults) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO project_types
             (project_type, template, default_services, default_capabilities, default_instructions)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            defaults.project_type,
            defaults.template,
            serde_json::to_string(&defaults.services)?,
            serde_json::to_string(&defaults.capabilities)?,
            serde_json::to_string(&defaults.instructions)?,
        ],
    )?;
    Ok(())
}

pub fn get_type_defaults(
    conn: &Connection,
    project_type: &str,
) -> Result<Option<ProjectTypeDefaults>> {
    let row: Option<(String, String, String, String)> = conn
        .query_row(
            "SELECT template, default_services, default_capabilities, default_instructions
             FROM project_types WHERE project_type = ?1",
            params![project_type],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    let Some((template, services, capabilities, instructions)) = row else {
        return Ok(None);
    };

    let list = |column: &str, raw: &str| -> Result<Vec<String>> {
        serde_json::from_str(raw)
            .with_context(|| format!("project type {project_type}: {column} is not a string array"))
    };

    Ok(Some(ProjectTypeDefaults {
        project_type: project_type.to_string(),
        template,
        services: list("default_services", &services)?,
        capabilities: list("default_capabilities", &capabilities)?,
        instructions: list("default_instructions", &instructions)?,
    }))
}

/// Store the override document for a project. The document must be a JSON object;
/// its shape is checked at synthesis time.
pub fn set_override(conn: &Connection, project: &str, content: &serde_json::Value) -> Result<()> {
    if !content.is_object() {
        bail!("override for {project} must be a JSON object");
    }
    if get_project(conn, project)?.is_none() {
        bail!("unknown project: {project}");
    }
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT OR REPLACE INTO project_overrides (project, content, updated_at) VALUES (?1, ?2, ?3)",
        params![project, content.to_string(), now],
    )?;
    Ok(())
}

/// Raw override text for a project, `None` when the project has no overrides.
pub fn get_override(conn: &Connection, project: &str) -> Result<Option<String>> {
    let content = conn
        .query_row(
            "SELECT content FROM project_overrides WHERE project = ?1",
            params![project],
            |row| row.get(0),
        )
        .optional()?;
    Ok(content)
}

/// Remove a project's override document. Returns `true` if one existed.
pub fn clear_override(conn: &Connection, project: &str) -> Result<bool> {
    let rows = conn.execute(
        "DELETE FROM project_overrides WHERE project = ?1",
        params![project],
    )?;
    Ok(rows > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn upsert_keeps_existing_path_when_none_given() {
        let conn = crate::db::open_memory_database().unwrap();
        upsert_project(&conn, "alpha", "web", Some("/work/alpha")).unwrap();
        upsert_project(&conn, "alpha", "infra", None).unwrap();

        let project = get_project(&conn, "alpha").unwrap().unwrap();
        assert_eq!(project.project_type, "infra");
        assert_eq!(project.path.as_deref(), Some("/work/alpha"));
        assert_eq!(
            project_for_path(&conn, "/work/alpha").unwrap().as_deref(),
            Some("alpha")
        );
        assert!(project_for_path(&conn, "/work/beta").unwrap().is_none());
    }

    #[test]
    fn type_defaults_round_trip_lists() {
        let conn = crate::db::open_memory_database().unwrap();
        let defaults = ProjectTypeDefaults {
            project_type: "web".into(),
            template: "hooks-base".into(),
            services: vec!["postgres".into()],
            capabilities: vec!["a".into(), "b".into()],
            instructions: vec![],
        };
        set_type_defaults(&conn, &defaults).unwrap();
        assert_eq!(get_type_defaults(&conn, "web").unwrap(), Some(defaults));
        assert!(get_type_defaults(&conn, "mobile").unwrap().is_none());
    }

    #[test]
    fn corrupt_default_list_is_an_error() {
        let conn = crate::db::open_memory_database().unwrap();
        conn.execute(
            "INSERT INTO project_types (project_type, template, default_services) VALUES ('web', 'base', 'not json')",
            [],
        )
        .unwrap();
        assert!(get_type_defaults(&conn, "web").is_err());
    }

    #[test]
    fn override_requires_known_project() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(set_override(&conn, "ghost", &json!({})).is_err());

        upsert_project(&conn, "alpha", "web", None).unwrap();
        set_override(&conn, "alpha", &json!({"skills": {"append": ["c"]}})).unwrap();
        assert!(get_override(&conn, "alpha").unwrap().is_some());
        assert!(clear_override(&conn, "alpha").unwrap());
        assert!(get_override(&conn, "alpha").unwrap().is_none());
    }
}
