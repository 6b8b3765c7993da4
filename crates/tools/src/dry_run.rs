//! Executor that records requests without touching anything.

use async_trait::async_trait;
use repolens_core::error::ToolError;
use repolens_core::{ActionExecutor, ExecutionReport, ExecutionRequest, ExecutionStatus};
use std::sync::Mutex;
use tracing::debug;

/// Reports every request as `proposed` and keeps a copy for inspection.
#[derive(Default)]
pub struct DryRunExecutor {
    recorded: Mutex<Vec<ExecutionRequest>>,
}

impl DryRunExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<ExecutionRequest> {
        self.recorded
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ToolError> {
        let summary = match &request {
            ExecutionRequest::WriteFile { file_path, .. } => format!("write {file_path}"),
            ExecutionRequest::RunTests { command, .. } => format!("run `{command}`"),
            ExecutionRequest::Apply { action } => format!("{} {}", action.kind, action.target_file),
        };
        debug!(request = request.label(), %summary, "Dry run");
        if let Ok(mut recorded) = self.recorded.lock() {
            recorded.push(request);
        }
        Ok(ExecutionReport::new(
            ExecutionStatus::Proposed,
            Some(format!("Dry run: would {summary}")),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_and_reports_proposed() {
        let exec = DryRunExecutor::new();
        let report = exec
            .execute(ExecutionRequest::WriteFile {
                file_path: "a.py".into(),
                content: "x".into(),
            })
            .await
            .unwrap();
        assert_eq!(report.status, ExecutionStatus::Proposed);
        assert_eq!(report.output.as_deref(), Some("Dry run: would write a.py"));
        assert_eq!(exec.recorded().len(), 1);
    }
}
