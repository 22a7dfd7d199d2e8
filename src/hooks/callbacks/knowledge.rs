//! Prompt-time knowledge lookup.

use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Write;
use std::time::{Duration, Instant};

use crate::config::KnowledgeConfig;
use crate::hooks::event::{HookEvent, HookInput};
use crate::hooks::orchestrator::{Callback, CallbackOutcome, HookContext};
use crate::knowledge::{filter_relevant, KnowledgeDoc};
use crate::store::usage::{self, KnowledgeUsage};

const LOGGING_GRACE: Duration = Duration::from_secs(1);

/// Sends the prompt to the knowledge lookup and injects relevant documents.
/// Every lookup is logged, including ones that timed out.
pub struct KnowledgePrompt {
    budget: Duration,
}

impl KnowledgePrompt {
    pub fn new(config: &KnowledgeConfig) -> Self {
        Self {
            budget: Duration::from_millis(config.timeout_ms) + LOGGING_GRACE,
        }
    }

    /// Prompts too short to search on, and slash commands, are skipped.
    pub fn should_search(prompt: &str, min_chars: usize) -> bool {
        let prompt = prompt.trim();
        !prompt.starts_with('/') && prompt.chars().count() >= min_chars
    }
}

#[async_trait]
impl Callback for KnowledgePrompt {
    fn name(&self) -> &str {
        "knowledge-lookup"
    }

    fn events(&self) -> &[HookEvent] {
        &[HookEvent::UserPromptSubmit]
    }

    fn priority(&self) -> i32 {
        50
    }

    // The lookup has its own deadline; this one leaves room to log the result.
    fn timeout(&self) -> Option<Duration> {
        Some(self.budget)
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome> {
        let settings = &ctx.config.knowledge;
        let Some(prompt) = input.prompt.as_deref() else {
            return Ok(CallbackOutcome::none());
        };
        if !Self::should_search(prompt, settings.min_prompt_chars) {
            return Ok(CallbackOutcome::none());
        }
        if !ctx.lookup.is_enabled() {
            tracing::debug!(session_id = %ctx.session_id, "no knowledge service configured");
            return Ok(CallbackOutcome::none());
        }

        let started = Instant::now();
        let deadline = Duration::from_millis(settings.timeout_ms);
        let docs = match tokio::time::timeout(
            deadline,
            ctx.lookup.lookup(prompt, settings.max_results),
        )
        .await
        {
            Ok(Ok(docs)) => docs,
            Ok(Err(e)) => {
                tracing::warn!(session_id = %ctx.session_id, error = %format!("{e:#}"), "knowledge lookup failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(
                    session_id = %ctx.session_id,
                    timeout_ms = settings.timeout_ms,
                    "knowledge lookup timed out"
                );
                Vec::new()
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;
        let relevant = filter_relevant(docs, settings.min_similarity, settings.max_results);

        let session_id = ctx.session_id.clone();
        let project = ctx.project.clone();
        let query = prompt.to_string();
        let result_count = relevant.len();
        let top_similarity = relevant.first().map(|d| d.similarity);
        if let Err(e) = ctx
            .with_db(move |conn| {
                usage::log_knowledge_usage(
                    conn,
                    &KnowledgeUsage {
                        session_id: Some(&session_id),
                        project: Some(&project),
                        query: &query,
                        result_count,
                        top_similarity,
                        latency_ms,
                    },
                )
            })
            .await
        {
            tracing::warn!(error = %e, "could not log knowledge usage");
        }

        if relevant.is_empty() {
            return Ok(CallbackOutcome::none());
        }
        Ok(CallbackOutcome::context(render_docs(&relevant)))
    }
}

fn render_docs(docs: &[KnowledgeDoc]) -> String {
    let mut text = String::from("Relevant knowledge:");
    for doc in docs {
        let _ = write!(text, "\n- {} ({:.0}% match)", doc.title, doc.similarity * 100.0);
        if let Some(path) = &doc.path {
            let _ = write!(text, " [{path}]");
        }
        if !doc.snippet.is_empty() {
            let _ = write!(text, "\n  {}", doc.snippet.trim());
        }
    }
    text
}
