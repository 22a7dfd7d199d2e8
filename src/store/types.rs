//! Row types for the configuration sources and lifecycle records.
//!
//! [`TemplateKind`] and [`DeployOutcome`] are the closed vocabularies stored as
//! text columns; the structs mirror their tables one-to-one.

use serde::{Deserialize, Serialize};

/// What a template contributes to a synthesized document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateKind {
    /// Hook registrations (event → ordered callback list).
    HookSet,
    /// Allow/deny/ask permission lists.
    ToolPermissions,
    /// Enabled service bindings.
    ServiceBindings,
}

impl TemplateKind {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HookSet => "hook-set",
            Self::ToolPermissions => "tool-permissions",
            Self::ServiceBindings => "service-bindings",
        }
    }
}

impl std::fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TemplateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hook-set" => Ok(Self::HookSet),
            "tool-permissions" => Ok(Self::ToolPermissions),
            "service-bindings" => Ok(Self::ServiceBindings),
            _ => Err(format!("unknown template kind: {s}")),
        }
    }
}

/// A named, versioned, inheritable configuration fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub name: String,
    pub kind: TemplateKind,
    /// Template this one extends. Resolved parent-first during synthesis.
    pub parent: Option<String>,
    /// Layer document (see [`crate::synth::document::ConfigLayer`]).
    pub content: serde_json::Value,
    /// Incremented on every upsert.
    pub version: i64,
    pub updated_at: String,
}

/// Defaults shared by every project of one type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTypeDefaults {
    pub project_type: String,
    /// Name of the template whose chain forms the base document.
    pub template: String,
    pub services: Vec<String>,
    pub capabilities: Vec<String>,
    pub instructions: Vec<String>,
}

/// A registered project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub project_type: String,
    pub path: Option<String>,
    pub created_at: String,
}

/// Result of a deployment attempt, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployOutcome {
    /// Content differed from (or there was no) previous artifact.
    Written,
    /// Content hash matched the previous artifact; the file was rewritten anyway.
    Unchanged,
    /// The filesystem write failed; the previous artifact stays authoritative.
    Failed,
}

impl DeployOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Written => "written",
            Self::Unchanged => "unchanged",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for DeployOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeployOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "written" => Ok(Self::Written),
            "unchanged" => Ok(Self::Unchanged),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown deploy outcome: {s}")),
        }
    }
}

/// One append-only row of the deployment audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub id: i64,
    pub project: String,
    pub artifact_kind: String,
    pub artifact_path: String,
    /// SHA-256 of the written bytes, lowercase hex.
    pub content_hash: String,
    pub outcome: DeployOutcome,
    pub detail: Option<String>,
    pub created_at: String,
}

/// One working session, from start event to end event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier supplied by the host runtime.
    pub id: String,
    pub identity: String,
    pub project: String,
    pub started_at: String,
    /// `None` while the session is open.
    pub ended_at: Option<String>,
    pub summary: Option<String>,
    pub completed_work: Vec<String>,
    pub learnings: Vec<String>,
}

impl Session {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Where work on a project was left. One row per project, overwritten in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub project: String,
    pub current_focus: Option<String>,
    pub next_steps: Vec<String>,
    pub updated_at: String,
    /// Session that wrote this state, if written from a session.
    pub updated_by: Option<String>,
    /// Incremented on every write.
    pub revision: i64,
}
