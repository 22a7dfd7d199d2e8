//! Template inheritance resolution.

use anyhow::Result;

use super::error::SynthesisError;
use crate::store::types::Template;

/// Longest inheritance chain accepted before giving up.
pub const MAX_CHAIN_DEPTH: usize = 32;

/// Walk `start`'s `parent` links and return the chain parent-first (root
/// template first, `start` last).
///
/// `lookup` fetches a template by name. A missing template, a name seen twice,
/// or a chain longer than [`MAX_CHAIN_DEPTH`] is a [`SynthesisError`].
pub fn resolve_chain<F>(start: &str, mut lookup: F) -> Result<Vec<Template>>
where
    F: FnMut(&str) -> Result<Option<Template>>,
{
    let mut walked: Vec<Template> = Vec::new();
    let mut next = Some(start.to_string());

    while let Some(name) = next {
        if walked.iter().any(|t| t.name == name) {
            let mut path: Vec<String> = walked.iter().map(|t| t.name.clone()).collect();
            path.push(name);
            return Err(SynthesisError::InheritanceCycle(path).into());
        }
        if walked.len() >= MAX_CHAIN_DEPTH {
            return Err(SynthesisError::ChainTooDeep {
                start: start.to_string(),
                max: MAX_CHAIN_DEPTH,
            }
            .into());
        }

        let template = lookup(&name)?.ok_or(SynthesisError::UnknownTemplate(name))?;
        next = template.parent.clone();
        walked.push(template);
    }

    walked.reverse();
    Ok(walked)
}
