//! Configuration synthesis: four layers merged into one artifact.
//!
//! Layers apply in a fixed order, later layers winning:
//!
//! 1. the project type's template chain, root template first
//! 2. the project type's default lists (appended)
//! 3. the project's override document, if any
//! 4. the `permissions` section of the artifact already on disk, if readable
//!
//! [`load_inputs`] gathers everything from the database and the filesystem;
//! [`synthesize`] is pure over those inputs, so the same inputs always yield
//! the same bytes and the same hash.

pub mod chain;
pub mod document;
pub mod error;

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::store::types::{ProjectTypeDefaults, Template};
use crate::store::{projects, templates};
use document::{ConfigDocument, ConfigLayer, ListPatch, Permissions};
use error::SynthesisError;

/// Everything synthesis reads, already loaded.
#[derive(Debug, Clone)]
pub struct SynthesisInputs {
    pub project: String,
    /// Template chain, root first.
    pub chain: Vec<Template>,
    pub type_defaults: ProjectTypeDefaults,
    /// Raw override document; `None` means no overrides.
    pub override_doc: Option<String>,
    /// Permissions read from the previous artifact.
    pub preserved: Option<Permissions>,
}

/// The merge result, serialized exactly as it will be written.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedConfig {
    pub project: String,
    pub document: ConfigDocument,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// SHA-256 of `bytes`, lowercase hex.
    pub hash: String,
}

/// Merge the inputs into a document. Pure: no I/O.
pub fn synthesize(inputs: &SynthesisInputs) -> Result<SynthesizedConfig, SynthesisError> {
    let mut document = ConfigDocument::default();

    for template in &inputs.chain {
        let layer: ConfigLayer = serde_json::from_value(template.content.clone()).map_err(
            |source| SynthesisError::MalformedTemplate {
                name: template.name.clone(),
                source,
            },
        )?;
        document.apply(&layer);
    }

    document.apply(&defaults_layer(&inputs.type_defaults));

    if let Some(raw) = &inputs.override_doc {
        let layer: ConfigLayer =
            serde_json::from_str(raw).map_err(|source| SynthesisError::MalformedOverride {
                project: inputs.project.clone(),
                source,
            })?;
        document.apply(&layer);
    }

    if let Some(preserved) = &inputs.preserved {
        document.permissions = preserved.clone();
    }

    let bytes = render(&document);
    let hash = content_hash(&bytes);
    Ok(SynthesizedConfig {
        project: inputs.project.clone(),
        document,
        bytes,
        hash,
    })
}

/// Load synthesis inputs for `project`, reading preserved permissions from
/// `artifact_path`.
pub fn load_inputs(
    conn: &Connection,
    project: &str,
    artifact_path: &Path,
) -> Result<SynthesisInputs> {
    let record = projects::get_project(conn, project)?
        .ok_or_else(|| SynthesisError::UnknownProject(project.to_string()))?;

    let type_defaults = projects::get_type_defaults(conn, &record.project_type)?.ok_or_else(|| {
        SynthesisError::UnknownProjectType {
            project: project.to_string(),
            project_type: record.project_type.clone(),
        }
    })?;

    let chain = chain::resolve_chain(&type_defaults.template, |name| {
        templates::get_template(conn, name)
    })?;

    let override_doc = projects::get_override(conn, project)?;
    let preserved = read_preserved_permissions(artifact_path);

    tracing::debug!(
        project,
        project_type = %record.project_type,
        chain_len = chain.len(),
        has_override = override_doc.is_some(),
        has_preserved = preserved.is_some(),
        "synthesis inputs loaded"
    );

    Ok(SynthesisInputs {
        project: project.to_string(),
        chain,
        type_defaults,
        override_doc,
        preserved,
    })
}

/// [`load_inputs`] followed by [`synthesize`].
pub fn synthesize_project(
    conn: &Connection,
    project: &str,
    artifact_path: &Path,
) -> Result<SynthesizedConfig> {
    let inputs = load_inputs(conn, project, artifact_path)?;
    Ok(synthesize(&inputs)?)
}

/// Read the `permissions` section of an existing artifact.
///
/// A missing file, unreadable JSON, or a malformed section all yield `None`:
/// the grant set degrades to empty instead of failing synthesis.
pub fn read_preserved_permissions(artifact_path: &Path) -> Option<Permissions> {
    let raw = match std::fs::read_to_string(artifact_path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %artifact_path.display(), error = %e, "cannot read existing artifact");
            return None;
        }
    };

    let parsed: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(path = %artifact_path.display(), error = %e, "existing artifact is not valid JSON");
            return None;
        }
    };

    let section = parsed.get("permissions")?.clone();
    match serde_json::from_value(section) {
        Ok(permissions) => Some(permissions),
        Err(e) => {
            tracing::warn!(path = %artifact_path.display(), error = %e, "existing permissions section is malformed");
            None
        }
    }
}

/// Canonical serialization: pretty JSON with a trailing newline.
pub fn render(document: &ConfigDocument) -> Vec<u8> {
    // Serializing a struct of strings, vectors and JSON maps cannot fail.
    let mut bytes = serde_json::to_vec_pretty(document).unwrap_or_default();
    bytes.push(b'\n');
    bytes
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn defaults_layer(defaults: &ProjectTypeDefaults) -> ConfigLayer {
    ConfigLayer {
        services: Some(ListPatch::append(defaults.services.clone())),
        capabilities: Some(ListPatch::append(defaults.capabilities.clone())),
        instructions: Some(ListPatch::append(defaults.instructions.clone())),
        ..Default::default()
    }
}
