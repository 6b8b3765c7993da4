//! Workspace identity, the tenant boundary for every index operation.

use crate::error::IndexError;
use serde::{Deserialize, Serialize};
use std::fmt;

const MAX_WORKSPACE_ID_LEN: usize = 64;

/// A validated workspace identifier.
///
/// Every stored chunk and every query is keyed by the collection name derived
/// from this id, so two workspaces can never observe each other's data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceId(String);

impl WorkspaceId {
    pub fn new(id: impl Into<String>) -> Result<Self, IndexError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= MAX_WORKSPACE_ID_LEN
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if valid {
            Ok(Self(id))
        } else {
            Err(IndexError::InvalidWorkspace(id))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The logical collection holding this workspace's chunks.
    pub fn collection_name(&self) -> String {
        format!("codebase_{}", self.0)
    }
}

impl TryFrom<String> for WorkspaceId {
    type Error = IndexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkspaceId> for String {
    fn from(value: WorkspaceId) -> Self {
        value.0
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
