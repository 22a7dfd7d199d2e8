//! Database-driven configuration synthesis and session lifecycle hooks for AI
//! coding assistants.
//!
//! Conductor keeps every project's assistant configuration in one SQLite
//! database and regenerates the on-disk settings file at the start of each
//! working session. It merges four layers, later layers winning:
//!
//! | Layer | Source | Merge |
//! |-------|--------|-------|
//! | **Template chain** | `templates`, root first | deep merge, list patches |
//! | **Type defaults** | `project_types` | lists appended |
//! | **Project override** | `project_overrides` | deep merge, list patches |
//! | **Granted permissions** | the previous artifact on disk | replaces `permissions` |
//!
//! The same binary is registered as the host runtime's hook command. Each
//! lifecycle event (start, prompt, tool use, compaction, end) is dispatched to a
//! fixed set of callbacks with defined ordering, per-callback timeouts, and
//! at-most-once start semantics.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`db`] — SQLite initialization, schema, migrations, and health checks
//! - [`store`] — Typed access to templates, projects, sessions, state and audit rows
//! - [`synth`] — The pure merge engine and its configuration errors
//! - [`deploy`] — Atomic artifact writes and the deployment audit trail
//! - [`hooks`] — Hook protocol types, the orchestrator, and built-in callbacks
//! - [`knowledge`] — Interface to the external knowledge lookup service

pub mod config;
pub mod db;
pub mod deploy;
pub mod hooks;
pub mod knowledge;
pub mod store;
pub mod synth;
