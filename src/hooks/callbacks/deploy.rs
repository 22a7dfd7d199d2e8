//! Regenerate the project's artifact on session start.

use anyhow::Result;
use async_trait::async_trait;

use crate::deploy;
use crate::hooks::event::{HookEvent, HookInput};
use crate::hooks::orchestrator::{Callback, CallbackOutcome, HookContext};
use crate::store::projects;
use crate::synth::error::is_configuration_error;

pub struct DeployConfig;

#[async_trait]
impl Callback for DeployConfig {
    fn name(&self) -> &str {
        "config-deploy"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::SessionStart]
    }

    fn priority(&self) -> i32 {
        20
    }

    async fn run(&self, ctx: &HookContext, _input: &HookInput) -> Result<CallbackOutcome> {
        let config = ctx.config.clone();
        let project = ctx.project.clone();
        let cwd = ctx.cwd.clone();

        // Directories nobody registered get no artifact and no failed rows.
        let result = ctx
            .with_db(move |conn| {
                if projects::get_project(conn, &project)?.is_none() {
                    return Ok(None);
                }
                deploy::resync(conn, &config, &project, &cwd).map(Some)
            })
            .await;

        match result {
            Ok(None) => {
                tracing::debug!(
                    project = %ctx.project,
                    cwd = %ctx.cwd.display(),
                    "unregistered project, nothing to deploy"
                );
                Ok(CallbackOutcome::none())
            }
            Ok(Some(deployment)) => {
                tracing::debug!(
                    project = %ctx.project,
                    outcome = %deployment.outcome,
                    hash = %deployment.hash,
                    "start deployment finished"
                );
                Ok(CallbackOutcome::none())
            }
            // The operator must see configuration problems; the old artifact stays.
            Err(e) if is_configuration_error(&e) => Ok(CallbackOutcome::message(format!(
                "conductor: configuration error for {}: {e}. Previous settings kept.",
                ctx.project
            ))),
            Err(e) => Err(e),
        }
    }
}
