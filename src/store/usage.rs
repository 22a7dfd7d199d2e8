//! Usage logs written by lifecycle callbacks: knowledge lookups and tool calls.

use anyhow::Result;
use rusqlite::{params, Connection};

/// One knowledge lookup, as logged by the prompt callback.
#[derive(Debug, Clone)]
pub struct KnowledgeUsage<'a> {
    pub session_id: Option<&'a str>,
    pub project: Option<&'a str>,
    pub query: &'a str,
    pub result_count: usize,
    pub top_similarity: Option<f64>,
    pub latency_ms: u64,
}

pub fn log_knowledge_usage(conn: &Connection, usage: &KnowledgeUsage<'_>) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO knowledge_usage (session_id, project, query, result_count, top_similarity, latency_ms, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            usage.session_id,
            usage.project,
            usage.query,
            usage.result_count as i64,
            usage.top_similarity,
            usage.latency_ms as i64,
            now,
        ],
    )?;
    Ok(())
}

/// Record one completed tool call.
pub fn log_tool_usage(
    conn: &Connection,
    session_id: Option<&str>,
    project: Option<&str>,
    tool_name: &str,
    success: bool,
) -> Result<()> {
    let now = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO tool_usage (session_id, project, tool_name, service, success, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![session_id, project, tool_name, service_of(tool_name), success, now],
    )?;
    Ok(())
}

/// Service name of a namespaced tool: `mcp__postgres__execute_sql` → `postgres`.
pub fn service_of(tool_name: &str) -> Option<&str> {
    let rest = tool_name.strip_prefix("mcp__")?;
    let (service, _tool) = rest.split_once("__")?;
    (!service.is_empty()).then_some(service)
}
