//! Action generation, the agent loop and the analysis service.
//!
//! - [`ActionGenerator`] makes one tool-calling request and maps the calls to
//!   [`Action`](repolens_core::Action)s
//! - [`AgentLoop`] runs the bounded Reasoning → ToolDispatch cycle against a
//!   context retriever and an action executor
//! - [`AnalysisService`] combines ranked retrieval, a streamed explanation
//!   and generated actions into one response

pub mod analysis;
pub mod generator;
pub mod goal;
pub mod loop_runner;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use analysis::{AnalysisRequest, AnalysisResponse, AnalysisService};
pub use generator::{ActionGenerator, default_tools};
pub use goal::AnalysisGoal;
pub use loop_runner::{AgentLoop, AgentOutcome, AgentTurn, Termination, ToolObservation, agent_tools};
