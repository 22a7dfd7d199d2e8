use thiserror::Error;

/// Configuration errors. Any of these aborts synthesis and leaves the previously
/// deployed artifact untouched.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("unknown project: {0}")]
    UnknownProject(String),

    #[error("project {project} has unknown type '{project_type}'")]
    UnknownProjectType {
        project: String,
        project_type: String,
    },

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("template inheritance cycle: {}", .0.join(" -> "))]
    InheritanceCycle(Vec<String>),

    #[error("template chain starting at {start} exceeds {max} levels")]
    ChainTooDeep { start: String, max: usize },

    #[error("malformed template {name}: {source}")]
    MalformedTemplate {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed override for project {project}: {source}")]
    MalformedOverride {
        project: String,
        #[source]
        source: serde_json::Error,
    },
}

/// `true` if `err` (or anything it wraps) is a [`SynthesisError`].
pub fn is_configuration_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<SynthesisError>().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_message_lists_the_path() {
        let err = SynthesisError::InheritanceCycle(vec!["x".into(), "y".into(), "x".into()]);
        assert_eq!(err.to_string(), "template inheritance cycle: x -> y -> x");
    }

    #[test]
    fn detects_wrapped_configuration_errors() {
        let err: anyhow::Error = SynthesisError::UnknownTemplate("base".into()).into();
        assert!(is_configuration_error(&err));
        assert!(!is_configuration_error(&anyhow::anyhow!("disk on fire")));
    }
}
