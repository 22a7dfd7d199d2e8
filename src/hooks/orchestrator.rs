//! Callback registry and dispatch.
//!
//! Callbacks for an event run one after another in ascending priority, ties
//! broken by registration order. Each runs under its own timeout. A failing or
//! timed-out callback is logged and counted, and the chain moves on. Denials
//! are collected rather than short-circuiting.
//!
//! Two per-session rules are enforced here, backed by `hook_markers`:
//! `SessionStart` callbacks run at most once per session, and once
//! `SessionEnd` has fired every later non-start event is ignored.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use super::event::{Decision, HookEvent, HookInput, HookOutput, HookSpecificOutput};
use crate::config::ConductorConfig;
use crate::db::SharedDb;
use crate::knowledge::KnowledgeLookup;
use crate::store::markers;

/// Everything a callback may touch for one event.
#[derive(Clone)]
pub struct HookContext {
    pub session_id: String,
    pub project: String,
    pub cwd: PathBuf,
    pub config: Arc<ConductorConfig>,
    /// `None` when the database could not be opened.
    pub db: Option<SharedDb>,
    pub lookup: Arc<dyn KnowledgeLookup>,
}

impl HookContext {
    /// Run `f` against the database on the blocking pool. A lock poisoned by an
    /// earlier panicking task is recovered; SQLite rolls back its transaction.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = self
            .db
            .clone()
            .ok_or_else(|| anyhow!("database unavailable"))?;
        tokio::task::spawn_blocking(move || {
            let mut conn = db.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut conn)
        })
        .await
        .context("database task panicked")?
    }
}

/// What one callback contributes to the response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallbackOutcome {
    /// Text injected into the assistant's context.
    pub context: Option<String>,
    /// Text shown to the user.
    pub system_message: Option<String>,
    /// Reason for denying the pending action (gating events only).
    pub deny: Option<String>,
}

impl CallbackOutcome {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn context(text: impl Into<String>) -> Self {
        Self {
            context: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn message(text: impl Into<String>) -> Self {
        Self {
            system_message: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            deny: Some(reason.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
pub trait Callback: Send + Sync {
    /// Stable name, used in logs and in `[hooks] disabled`.
    fn name(&self) -> &str;

    fn events(&self) -> &[HookEvent];

    /// Lower runs first.
    fn priority(&self) -> i32 {
        100
    }

    /// Override the orchestrator's default timeout for this callback.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn run(&self, ctx: &HookContext, input: &HookInput) -> Result<CallbackOutcome>;
}

/// Why an event was not dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    UnknownEvent,
    DuplicateStart,
    SessionEnded,
}

/// What happened during one dispatch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub event: Option<HookEvent>,
    pub skipped: Option<SkipReason>,
    /// Callback names that completed, in run order.
    pub completed: Vec<String>,
    /// Callback names that failed or timed out, in run order.
    pub failed: Vec<String>,
    pub contexts: Vec<String>,
    pub system_messages: Vec<String>,
    pub denials: Vec<String>,
}

impl DispatchReport {
    fn skip(event: Option<HookEvent>, reason: SkipReason) -> Self {
        Self {
            event,
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Fold the report into the host response.
    pub fn to_output(&self) -> HookOutput {
        let Some(event) = self.event else {
            return HookOutput::empty();
        };
        if self.skipped.is_some() {
            return HookOutput::empty();
        }

        let mut messages = self.system_messages.clone();
        let context = (!self.contexts.is_empty()).then(|| self.contexts.join("\n\n"));

        let mut specific = HookSpecificOutput {
            hook_event_name: event.as_str().to_string(),
            additional_context: None,
            permission_decision: None,
            permission_decision_reason: None,
        };
        match context {
            Some(text) if event.accepts_context() => specific.additional_context = Some(text),
            Some(text) => messages.push(text),
            None => {}
        }
        if event.is_gating() && !self.denials.is_empty() {
            specific.permission_decision = Some(Decision::Deny);
            specific.permission_decision_reason = Some(self.denials.join("; "));
        }

        let has_specific =
            specific.additional_context.is_some() || specific.permission_decision.is_some();
        HookOutput {
            system_message: (!messages.is_empty()).then(|| messages.join("\n")),
            hook_specific_output: has_specific.then_some(specific),
        }
    }
}

struct Registered {
    order: usize,
    callback: Arc<dyn Callback>,
}

pub struct Orchestrator {
    callbacks: Vec<Registered>,
    disabled: HashSet<String>,
    default_timeout: Duration,
}

impl Orchestrator {
    pub fn new(default_timeout: Duration, disabled: &[String]) -> Self {
        Self {
            callbacks: Vec::new(),
            disabled: disabled.iter().cloned().collect(),
            default_timeout,
        }
    }

    pub fn from_config(config: &ConductorConfig) -> Self {
        Self::new(
            Duration::from_millis(config.hooks.callback_timeout_ms),
            &config.hooks.disabled,
        )
    }

    pub fn register(&mut self, callback: Arc<dyn Callback>) {
        let order = self.callbacks.len();
        self.callbacks.push(Registered { order, callback });
    }

    /// Enabled callbacks for `event`, in dispatch order.
    pub fn callbacks_for(&self, event: HookEvent) -> Vec<Arc<dyn Callback>> {
        let mut matching: Vec<&Registered> = self
            .callbacks
            .iter()
            .filter(|r| r.callback.events().contains(&event))
            .filter(|r| !self.disabled.contains(r.callback.name()))
            .collect();
        matching.sort_by_key(|r| (r.callback.priority(), r.order));
        matching.into_iter().map(|r| r.callback.clone()).collect()
    }

    pub async fn dispatch(&self, ctx: &HookContext, input: &HookInput) -> DispatchReport {
        let Some(event) = input.event() else {
            tracing::debug!(event = %input.hook_event_name, "ignoring unknown hook event");
            return DispatchReport::skip(None, SkipReason::UnknownEvent);
        };

        if let Some(reason) = self.check_markers(ctx, event).await {
            tracing::debug!(
                session_id = %ctx.session_id,
                event = %event,
                reason = ?reason,
                "event skipped"
            );
            return DispatchReport::skip(Some(event), reason);
        }

        let mut report = DispatchReport {
            event: Some(event),
            ..DispatchReport::default()
        };

        for callback in self.callbacks_for(event) {
            let name = callback.name().to_string();
            let limit = callback.timeout().unwrap_or(self.default_timeout);
            let started = Instant::now();
            // Own task per callback so a panic surfaces as a JoinError.
            let task = {
                let callback = callback.clone();
                let ctx = ctx.clone();
                let input = input.clone();
                tokio::spawn(async move { callback.run(&ctx, &input).await })
            };
            let abort = task.abort_handle();
            let result = tokio::time::timeout(limit, task).await;
            let elapsed_ms = started.elapsed().as_millis() as u64;

            match result {
                Ok(Ok(Ok(outcome))) => {
                    tracing::debug!(
                        session_id = %ctx.session_id,
                        event = %event,
                        callback = %name,
                        elapsed_ms,
                        "callback completed"
                    );
                    report.contexts.extend(outcome.context);
                    report.system_messages.extend(outcome.system_message);
                    report.denials.extend(outcome.deny);
                    report.completed.push(name);
                }
                Ok(Ok(Err(e))) => {
                    tracing::warn!(
                        session_id = %ctx.session_id,
                        event = %event,
                        callback = %name,
                        elapsed_ms,
                        error = %format!("{e:#}"),
                        "callback failed"
                    );
                    report.failed.push(name);
                }
                Ok(Err(join)) => {
                    tracing::error!(
                        session_id = %ctx.session_id,
                        event = %event,
                        callback = %name,
                        elapsed_ms,
                        panicked = join.is_panic(),
                        error = %join,
                        "callback aborted"
                    );
                    report.failed.push(name);
                }
                Err(_) => {
                    abort.abort();
                    tracing::warn!(
                        session_id = %ctx.session_id,
                        event = %event,
                        callback = %name,
                        timeout_ms = limit.as_millis() as u64,
                        "callback timed out"
                    );
                    report.failed.push(name);
                }
            }
        }

        tracing::info!(
            session_id = %ctx.session_id,
            project = %ctx.project,
            event = %event,
            completed = report.completed.len(),
            failed = report.failed.len(),
            denied = !report.denials.is_empty(),
            "hook dispatched"
        );
        report
    }

    /// Apply the start-once and terminal-end rules. Without a database both
    /// rules are unenforceable and the event runs.
    async fn check_markers(&self, ctx: &HookContext, event: HookEvent) -> Option<SkipReason> {
        ctx.db.as_ref()?;
        let session_id = ctx.session_id.clone();

        let result = ctx
            .with_db(move |conn| {
                if event == HookEvent::SessionStart {
                    if markers::claim(conn, &session_id, event.as_str())? {
                        return Ok(None);
                    }
                    let seen = markers::fire_count(conn, &session_id, event.as_str())?;
                    tracing::debug!(session_id = %session_id, seen, "repeated session start");
                    return Ok(Some(SkipReason::DuplicateStart));
                }
                if markers::has_fired(conn, &session_id, HookEvent::SessionEnd.as_str())? {
                    return Ok(Some(SkipReason::SessionEnded));
                }
                markers::touch(conn, &session_id, event.as_str())?;
                Ok(None)
            })
            .await;

        match result {
            Ok(skip) => skip,
            Err(e) => {
                tracing::warn!(
                    session_id = %ctx.session_id,
                    event = %event,
                    error = %format!("{e:#}"),
                    "hook marker check failed, dispatching anyway"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::NoLookup;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    struct Recorder {
        name: String,
        priority: i32,
        log: Log,
        outcome: CallbackOutcome,
    }

    #[async_trait]
    impl Callback for Recorder {
        fn name(&self) -> &str {
            &self.name
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::SessionStart, HookEvent::PreToolUse, HookEvent::PreCompact]
        }
        fn priority(&self) -> i32 {
            self.priority
        }
        async fn run(&self, _ctx: &HookContext, _input: &HookInput) -> Result<CallbackOutcome> {
            self.log.lock().unwrap().push(self.name.clone());
            Ok(self.outcome.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl Callback for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::SessionStart, HookEvent::PreToolUse]
        }
        async fn run(&self, _ctx: &HookContext, _input: &HookInput) -> Result<CallbackOutcome> {
            Err(anyhow!("boom"))
        }
    }

    struct Panicking;

    #[async_trait]
    impl Callback for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreToolUse]
        }
        async fn run(&self, _ctx: &HookContext, _input: &HookInput) -> Result<CallbackOutcome> {
            let empty: Vec<u8> = Vec::new();
            let _ = empty[3];
            Ok(CallbackOutcome::none())
        }
    }

    struct Slow;

    #[async_trait]
    impl Callback for Slow {
        fn name(&self) -> &str {
            "slow"
        }
        fn events(&self) -> &[HookEvent] {
            &[HookEvent::PreToolUse]
        }
        fn timeout(&self) -> Option<Duration> {
            Some(Duration::from_millis(20))
        }
        async fn run(&self, _ctx: &HookContext, _input: &HookInput) -> Result<CallbackOutcome> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(CallbackOutcome::context("too late"))
        }
    }

    fn recorder(name: &str, priority: i32, log: &Log) -> Arc<dyn Callback> {
        Arc::new(Recorder {
            name: name.into(),
            priority,
            log: log.clone(),
            outcome: CallbackOutcome::context(format!("from {name}")),
        })
    }

    fn context(db: Option<SharedDb>) -> HookContext {
        HookContext {
            session_id: "s1".into(),
            project: "alpha".into(),
            cwd: PathBuf::from("/work/alpha"),
            config: Arc::new(ConductorConfig::default()),
            db,
            lookup: Arc::new(NoLookup),
        }
    }

    fn input(event: &str) -> HookInput {
        HookInput {
            hook_event_name: event.into(),
            session_id: "s1".into(),
            ..Default::default()
        }
    }

    fn memory_db() -> SharedDb {
        crate::db::shared(crate::db::open_memory_database().unwrap())
    }

    #[tokio::test]
    async fn runs_by_priority_then_registration_order() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        orch.register(recorder("late", 50, &log));
        orch.register(recorder("first-tie", 10, &log));
        orch.register(recorder("second-tie", 10, &log));

        orch.dispatch(&context(None), &input("PreToolUse")).await;
        assert_eq!(*log.lock().unwrap(), vec!["first-tie", "second-tie", "late"]);
    }

    #[tokio::test]
    async fn failure_does_not_stop_the_chain() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        orch.register(recorder("one", 1, &log));
        orch.register(Arc::new(Failing));
        orch.register(recorder("three", 200, &log));

        let report = orch.dispatch(&context(None), &input("PreToolUse")).await;
        assert_eq!(report.completed, vec!["one", "three"]);
        assert_eq!(report.failed, vec!["failing"]);
        assert_eq!(report.contexts, vec!["from one", "from three"]);
    }

    #[tokio::test]
    async fn panic_is_contained_and_counted() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        orch.register(Arc::new(Panicking));
        orch.register(recorder("after", 500, &log));

        let report = orch.dispatch(&context(None), &input("PreToolUse")).await;
        assert_eq!(report.failed, vec!["panicking"]);
        assert_eq!(report.completed, vec!["after"]);
        let specific = report.to_output().hook_specific_output.unwrap();
        assert_eq!(specific.additional_context.as_deref(), Some("from after"));
    }

    #[tokio::test]
    async fn poisoned_database_lock_is_recovered() {
        let db = memory_db();
        let poisoner = db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();
        assert!(db.is_poisoned());

        let ctx = context(Some(db));
        let sessions: i64 = ctx
            .with_db(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(sessions, 0);
    }

    #[tokio::test]
    async fn timeout_counts_as_failure() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        orch.register(Arc::new(Slow));
        orch.register(recorder("after", 500, &log));

        let report = orch.dispatch(&context(None), &input("PreToolUse")).await;
        assert_eq!(report.failed, vec!["slow"]);
        assert_eq!(report.completed, vec!["after"]);
    }

    #[tokio::test]
    async fn denials_aggregate_without_stopping() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        for (name, reason) in [("guard-a", "a says no"), ("guard-b", "b says no")] {
            orch.register(Arc::new(Recorder {
                name: name.into(),
                priority: 10,
                log: log.clone(),
                outcome: CallbackOutcome::deny(reason),
            }));
        }
        orch.register(recorder("observer", 20, &log));

        let report = orch.dispatch(&context(None), &input("PreToolUse")).await;
        assert_eq!(report.completed.len(), 3);
        let output = report.to_output();
        let specific = output.hook_specific_output.unwrap();
        assert_eq!(specific.permission_decision, Some(Decision::Deny));
        assert_eq!(
            specific.permission_decision_reason.as_deref(),
            Some("a says no; b says no")
        );
        assert_eq!(specific.additional_context.as_deref(), Some("from observer"));
    }

    #[tokio::test]
    async fn disabled_callbacks_are_skipped() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &["noisy".to_string()]);
        orch.register(recorder("noisy", 1, &log));
        orch.register(recorder("quiet", 2, &log));

        orch.dispatch(&context(None), &input("PreToolUse")).await;
        assert_eq!(*log.lock().unwrap(), vec!["quiet"]);
    }

    #[tokio::test]
    async fn start_runs_once_per_session() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        orch.register(recorder("starter", 1, &log));
        let ctx = context(Some(memory_db()));

        let first = orch.dispatch(&ctx, &input("SessionStart")).await;
        let second = orch.dispatch(&ctx, &input("SessionStart")).await;

        assert!(first.skipped.is_none());
        assert_eq!(second.skipped, Some(SkipReason::DuplicateStart));
        assert!(second.to_output().is_empty());
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn events_after_end_are_ignored() {
        let log: Log = Arc::default();
        let mut orch = Orchestrator::new(Duration::from_secs(1), &[]);
        orch.register(recorder("tool", 1, &log));
        let ctx = context(Some(memory_db()));

        orch.dispatch(&ctx, &input("SessionEnd")).await;
        let report = orch.dispatch(&ctx, &input("PreToolUse")).await;
        assert_eq!(report.skipped, Some(SkipReason::SessionEnded));
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_event_yields_empty_output() {
        let orch = Orchestrator::new(Duration::from_secs(1), &[]);
        let report = orch.dispatch(&context(None), &input("Notification")).await;
        assert_eq!(report.skipped, Some(SkipReason::UnknownEvent));
        assert!(report.to_output().is_empty());
    }

    #[test]
    fn context_on_compaction_becomes_system_message() {
        let report = DispatchReport {
            event: Some(HookEvent::PreCompact),
            contexts: vec!["refresh".into()],
            ..Default::default()
        };
        let output = report.to_output();
        assert_eq!(output.system_message.as_deref(), Some("refresh"));
        assert!(output.hook_specific_output.is_none());
    }
}
