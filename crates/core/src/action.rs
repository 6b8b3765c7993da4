//! Structured action proposals and the executor collaborator.
//!
//! Raw tool names coming back from a model are normalized through an explicit
//! table into [`ActionKind`]. Names outside the table become
//! [`ActionKind::Unmapped`], which keeps the original string for logging and
//! only collapses to `edit` when serialized.

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Canonical action kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Edit,
    Create,
    Delete,
    Test,
    PrComment,
    SlackNotify,
    SearchCodebase,
    /// A raw tool name the table does not cover
    Unmapped(String),
}

/// Raw tool name → canonical kind. Canonical names map to themselves.
const TOOL_NAME_TABLE: &[(&str, ActionKind)] = &[
    ("edit", ActionKind::Edit),
    ("edit_file", ActionKind::Edit),
    ("create", ActionKind::Create),
    ("create_file", ActionKind::Create),
    ("delete", ActionKind::Delete),
    ("delete_file", ActionKind::Delete),
    ("test", ActionKind::Test),
    ("create_test", ActionKind::Test),
    ("generate_test", ActionKind::Test),
    ("run_tests", ActionKind::Test),
    ("pr_comment", ActionKind::PrComment),
    ("create_pr_comment", ActionKind::PrComment),
    ("add_pr_comment", ActionKind::PrComment),
    ("slack_notify", ActionKind::SlackNotify),
    ("search_codebase", ActionKind::SearchCodebase),
];

impl ActionKind {
    pub fn from_tool_name(name: &str) -> Self {
        TOOL_NAME_TABLE
            .iter()
            .find(|(raw, _)| *raw == name)
            .map(|(_, kind)| kind.clone())
            .unwrap_or_else(|| Self::Unmapped(name.to_string()))
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, Self::Unmapped(_))
    }

    /// The canonical `action_type` string. Unmapped kinds render as `edit`.
    pub fn rendered(&self) -> &'static str {
        match self {
            Self::Edit | Self::Unmapped(_) => "edit",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Test => "test",
            Self::PrComment => "pr_comment",
            Self::SlackNotify => "slack_notify",
            Self::SearchCodebase => "search_codebase",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unmapped(raw) => write!(f, "unmapped({raw})"),
            other => f.write_str(other.rendered()),
        }
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.rendered())
    }
}

impl<'de> Deserialize<'de> for ActionKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::from_tool_name(&raw))
    }
}

/// A structured proposal for an external executor. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "action_type")]
    pub kind: ActionKind,
    pub target_file: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_content: Option<String>,
    pub reasoning: String,
    /// In `[0, 1]`
    pub confidence: f32,
}

/// What the executor is asked to do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionRequest {
    /// Replace a file's content (the agent's `edit_file` tool)
    WriteFile { file_path: String, content: String },
    /// Run a test command (the agent's `run_tests` tool)
    RunTests {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cwd: Option<String>,
    },
    /// Apply a generated proposal
    Apply { action: Action },
}

impl ExecutionRequest {
    pub fn label(&self) -> &'static str {
        match self {
            Self::WriteFile { .. } => "write_file",
            Self::RunTests { .. } => "run_tests",
            Self::Apply { .. } => "apply",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
    /// Recorded but not applied
    Proposed,
    Skipped,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Proposed => "proposed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ExecutionReport {
    pub fn new(status: ExecutionStatus, output: Option<String>) -> Self {
        Self { status, output }
    }
}

/// Applies edits and runs tests on behalf of the agent loop.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> std::result::Result<ExecutionReport, ToolError>;
}
