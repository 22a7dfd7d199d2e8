//! Path-scoped guidance injected before file edits.

use anyhow::{Context, Result};
use regex::Regex;
use rusqlite::{params, Connection};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Standard {
    pub name: String,
    pub path_pattern: String,
    pub guidance: String,
    pub priority: i64,
}

pub fn put_standard(
    conn: &Connection,
    name: &str,
    path_pattern: &str,
    guidance: &str,
    priority: i64,
) -> Result<()> {
    Regex::new(path_pattern).with_context(|| format!("invalid path pattern for {name}"))?;
    conn.execute(
        "INSERT OR REPLACE INTO standards (name, path_pattern, guidance, priority, active)
         VALUES (?1, ?2, ?3, ?4, 1)",
        params![name, path_pattern, guidance, priority],
    )?;
    Ok(())
}

/// Active standards whose pattern matches `file_path`, in priority order.
/// Rows with an invalid pattern are skipped with a warning.
pub fn matching_standards(conn: &Connection, file_path: &str) -> Result<Vec<Standard>> {
    let mut stmt = conn.prepare(
        "SELECT name, path_pattern, guidance, priority FROM standards
         WHERE active = 1 ORDER BY priority, name",
    )?;
    let all = stmt
        .query_map([], |row| {
            Ok(Standard {
                name: row.get(0)?,
                path_pattern: row.get(1)?,
                guidance: row.get(2)?,
                priority: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let matching = all
        .into_iter()
        .filter(|standard| match Regex::new(&standard.path_pattern) {
            Ok(re) => re.is_match(file_path),
            Err(e) => {
                tracing::warn!(standard = %standard.name, error = %e, "skipping standard with invalid pattern");
                false
            }
        })
        .collect();
    Ok(matching)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_by_pattern_in_priority_order() {
        let conn = crate::db::open_memory_database().unwrap();
        put_standard(&conn, "rust-errors", r"\.rs$", "Propagate errors with ?", 20).unwrap();
        put_standard(&conn, "rust-docs", r"\.rs$", "Document public items", 10).unwrap();
        put_standard(&conn, "sql", r"\.sql$", "Use IF NOT EXISTS", 10).unwrap();

        let names: Vec<String> = matching_standards(&conn, "src/lib.rs")
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["rust-docs".to_string(), "rust-errors".to_string()]);
        assert!(matching_standards(&conn, "README.md").unwrap().is_empty());
    }

    #[test]
    fn invalid_pattern_is_rejected_on_write() {
        let conn = crate::db::open_memory_database().unwrap();
        assert!(put_standard(&conn, "bad", "(", "x", 1).is_err());
    }
}
