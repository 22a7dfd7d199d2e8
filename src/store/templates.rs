//! Template store: named, versioned configuration fragments.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::types::{Template, TemplateKind};

/// Insert or replace a template. The version starts at 1 and is bumped on every
/// later upsert of the same name. Returns the stored version.
pub fn put_template(
    conn: &Connection,
    name: &str,
    kind: TemplateKind,
    parent: Option<&str>,
    content: &serde_json::Value,
) -> Result<i64> {
    if name.trim().is_empty() {
        bail!("template name must not be empty");
    }
    if !content.is_object() {
        bail!("template content must be a JSON object");
    }
    if parent == Some(name) {
        bail!("template {name} cannot extend itself");
    }

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO templates (name, kind, parent, content, version, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)
         ON CONFLICT(name) DO UPDATE SET
             kind = excluded.kind,
             parent = excluded.parent,
             content = excluded.content,
             version = templates.version + 1,
             updated_at = excluded.updated_at",
        params![name, kind.as_str(), parent, content.to_string(), now],
    )?;

    let version: i64 = conn.query_row(
        "SELECT version FROM templates WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )?;
    tracing::info!(template = name, kind = %kind, version, "template stored");
    Ok(version)
}

/// Fetch a template by name.
pub fn get_template(conn: &Connection, name: &str) -> Result<Option<Template>> {
    let raw = conn
        .query_row(
            "SELECT name, kind, parent, content, version, updated_at FROM templates WHERE name = ?1",
            params![name],
            raw_template,
        )
        .optional()?;
    raw.map(hydrate).transpose()
}

/// All templates ordered by name.
pub fn list_templates(conn: &Connection) -> Result<Vec<Template>> {
    let mut stmt = conn.prepare(
        "SELECT name, kind, parent, content, version, updated_at FROM templates ORDER BY name",
    )?;
    let rows = stmt
        .query_map([], raw_template)?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter().map(hydrate).collect()
}

struct RawTemplate {
    name: String,
    kind: String,
    parent: Option<String>,
    content: String,
    version: i64,
    updated_at: String,
}

fn raw_template(row: &Row<'_>) -> rusqlite::Result<RawTemplate> {
    Ok(RawTemplate {
        name: row.get(0)?,
        kind: row.get(1)?,
        parent: row.get(2)?,
        content: row.get(3)?,
        version: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn hydrate(raw: RawTemplate) -> Result<Template> {
    let kind = raw
        .kind
        .parse::<TemplateKind>()
        .map_err(anyhow::Error::msg)?;
    let content = serde_json::from_str(&raw.content)
        .with_context(|| format!("template {} has unparseable content", raw.name))?;
    Ok(Template {
        name: raw.name,
        kind,
        parent: raw.parent,
        content,
        version: raw.version,
        updated_at: raw.updated_at,
    })
}
