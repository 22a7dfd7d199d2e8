//! Database access for configuration sources and lifecycle records.
//!
//! Every function takes a plain `&Connection` (or `&mut` when it needs a
//! transaction) so callers decide how the connection is shared.

pub mod deployments;
pub mod markers;
pub mod projects;
pub mod sessions;
pub mod standards;
pub mod state;
pub mod templates;
pub mod types;
pub mod usage;
