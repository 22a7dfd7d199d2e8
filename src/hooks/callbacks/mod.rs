//! The built-in lifecycle callbacks.
//!
//! | name                | event(s)                  | priority |
//! |---------------------|---------------------------|----------|
//! | `session-open`      | SessionStart              | 10       |
//! | `config-deploy`     | SessionStart              | 20       |
//! | `start-context`     | SessionStart              | 30       |
//! | `knowledge-lookup`  | UserPromptSubmit          | 50       |
//! | `artifact-guard`    | PreToolUse                | 10       |
//! | `standards-context` | PreToolUse                | 40       |
//! | `tool-audit`        | PreToolUse, PostToolUse   | 1000     |
//! | `compact-refresh`   | PreCompact                | 10       |
//! | `session-close`     | SessionEnd                | 900      |

pub mod context;
pub mod deploy;
pub mod knowledge;
pub mod session;
pub mod tools;

use std::sync::Arc;

use super::orchestrator::Orchestrator;
use crate::config::ConductorConfig;

/// An orchestrator with every built-in callback registered.
pub fn default_orchestrator(config: &ConductorConfig) -> Orchestrator {
    let mut orch = Orchestrator::from_config(config);
    orch.register(Arc::new(session::OpenSession));
    orch.register(Arc::new(deploy::DeployConfig));
    orch.register(Arc::new(context::StartContext));
    orch.register(Arc::new(knowledge::KnowledgePrompt::new(&config.knowledge)));
    orch.register(Arc::new(tools::ArtifactGuard));
    orch.register(Arc::new(tools::StandardsContext));
    orch.register(Arc::new(tools::ToolAudit));
    orch.register(Arc::new(context::CompactRefresh));
    orch.register(Arc::new(session::CloseSession));
    orch
}
