//! Action executors for RepoLens.
//!
//! The agent loop and the CLI hand generated actions to an
//! [`ActionExecutor`](repolens_core::ActionExecutor): [`LocalActionExecutor`]
//! applies them to a repository checkout inside a path sandbox,
//! [`DryRunExecutor`] only records them.

pub mod dry_run;
pub mod local;
pub mod sandbox;

pub use dry_run::DryRunExecutor;
pub use local::LocalActionExecutor;
pub use sandbox::resolve_within;
