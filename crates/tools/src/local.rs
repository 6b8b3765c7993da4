//! Executor that applies actions to a checked-out repository.
//!
//! Supports command allowlisting for tests, path sandboxing for writes and
//! deletes, and a wall-clock timeout on test runs.

use crate::sandbox::resolve_within;
use async_trait::async_trait;
use repolens_core::error::ToolError;
use repolens_core::{
    Action, ActionExecutor, ActionKind, ExecutionReport, ExecutionRequest, ExecutionStatus,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const DEFAULT_TEST_TIMEOUT_SECS: u64 = 300;

pub struct LocalActionExecutor {
    root: PathBuf,
    /// Executables `run_tests` may launch. Empty allows none.
    allowed_commands: Vec<String>,
    test_timeout: Duration,
}

impl LocalActionExecutor {
    pub fn new(root: impl Into<PathBuf>, allowed_commands: Vec<String>) -> Self {
        Self {
            root: root.into(),
            allowed_commands,
            test_timeout: Duration::from_secs(DEFAULT_TEST_TIMEOUT_SECS),
        }
    }

    pub fn with_test_timeout(mut self, timeout: Duration) -> Self {
        self.test_timeout = timeout;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_command_allowed(&self, program: &str) -> bool {
        self.allowed_commands.iter().any(|a| a == program)
    }

    async fn write_file(&self, file_path: &str, content: &str) -> Result<ExecutionReport, ToolError> {
        let path = resolve_within(&self.root, file_path)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| failed("write_file", format!("create {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| failed("write_file", format!("write {file_path}: {e}")))?;

        info!(file = %file_path, bytes = content.len(), "File written");
        Ok(ExecutionReport::new(
            ExecutionStatus::Success,
            Some(format!("Wrote {} bytes to {file_path}", content.len())),
        ))
    }

    async fn delete_file(&self, file_path: &str) -> Result<ExecutionReport, ToolError> {
        let path = resolve_within(&self.root, file_path)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(file = %file_path, "File deleted");
                Ok(ExecutionReport::new(
                    ExecutionStatus::Success,
                    Some(format!("Deleted {file_path}")),
                ))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ExecutionReport::new(
                ExecutionStatus::Failed,
                Some(format!("{file_path} does not exist")),
            )),
            Err(e) => Err(failed("delete_file", format!("{file_path}: {e}"))),
        }
    }

    async fn run_tests(
        &self,
        command: &str,
        cwd: Option<&str>,
    ) -> Result<ExecutionReport, ToolError> {
        let mut words = command.split_whitespace();
        let program = words
            .next()
            .ok_or_else(|| ToolError::InvalidArguments("empty test command".into()))?;
        if !self.is_command_allowed(program) {
            return Err(ToolError::PermissionDenied {
                tool_name: "run_tests".into(),
                reason: format!("Command '{program}' not in allowlist"),
            });
        }

        let dir = match cwd {
            Some(c) if !c.trim().is_empty() => resolve_within(&self.root, c)?,
            _ => self.root.clone(),
        };

        debug!(command = %command, dir = %dir.display(), "Running tests");
        let child = Command::new(program)
            .args(words)
            .current_dir(&dir)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.test_timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(failed("run_tests", e.to_string())),
            Err(_) => {
                warn!(command = %command, timeout_secs = self.test_timeout.as_secs(), "Test run timed out");
                return Err(ToolError::Timeout {
                    tool_name: "run_tests".into(),
                    timeout_secs: self.test_timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            format!("{}\n[stderr]: {}", stdout.trim(), stderr.trim())
        };

        let status = if output.status.success() {
            ExecutionStatus::Success
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Tests failed");
            ExecutionStatus::Failed
        };
        Ok(ExecutionReport::new(status, Some(combined)))
    }

    async fn apply(&self, action: &Action) -> Result<ExecutionReport, ToolError> {
        match (&action.kind, &action.new_content) {
            (ActionKind::Edit | ActionKind::Create | ActionKind::Test, Some(content)) => {
                self.write_file(&action.target_file, content).await
            }
            (ActionKind::Delete, _) => self.delete_file(&action.target_file).await,
            // Diffs without full content are left for a human to apply.
            (ActionKind::Edit | ActionKind::Create | ActionKind::Test, None) => {
                Ok(ExecutionReport::new(
                    ExecutionStatus::Proposed,
                    Some(format!("{} for {} needs manual review", action.kind, action.target_file)),
                ))
            }
            (kind, _) => Ok(ExecutionReport::new(
                ExecutionStatus::Skipped,
                Some(format!("{kind} actions are not executed locally")),
            )),
        }
    }
}

fn failed(tool_name: &str, reason: String) -> ToolError {
    ToolError::ExecutionFailed {
        tool_name: tool_name.into(),
        reason,
    }
}

#[async_trait]
impl ActionExecutor for LocalActionExecutor {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionReport, ToolError> {
        match &request {
            ExecutionRequest::WriteFile { file_path, content } => {
                self.write_file(file_path, content).await
            }
            ExecutionRequest::RunTests { command, cwd } => {
                self.run_tests(command, cwd.as_deref()).await
            }
            ExecutionRequest::Apply { action } => self.apply(action).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(kind: ActionKind, target: &str, new_content: Option<&str>) -> Action {
        Action {
            kind,
            target_file: target.into(),
            description: "d".into(),
            diff: None,
            new_content: new_content.map(String::from),
            reasoning: "r".into(),
            confidence: 0.85,
        }
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec![]);
        let report = exec
            .execute(ExecutionRequest::WriteFile {
                file_path: "src/nested/auth.py".into(),
                content: "def login():\n    pass\n".into(),
            })
            .await
            .unwrap();

        assert_eq!(report.status, ExecutionStatus::Success);
        let written = std::fs::read_to_string(dir.path().join("src/nested/auth.py")).unwrap();
        assert!(written.starts_with("def login"));
    }

    #[tokio::test]
    async fn write_outside_root_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec![]);
        let result = exec
            .execute(ExecutionRequest::WriteFile {
                file_path: "../escape.txt".into(),
                content: "x".into(),
            })
            .await;
        assert!(matches!(result, Err(ToolError::SandboxViolation(_))));
    }

    #[tokio::test]
    async fn apply_delete_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("old.py"), "x = 1\n").unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec![]);

        let gone = exec
            .execute(ExecutionRequest::Apply {
                action: action(ActionKind::Delete, "old.py", None),
            })
            .await
            .unwrap();
        assert_eq!(gone.status, ExecutionStatus::Success);
        assert!(!dir.path().join("old.py").exists());

        let again = exec
            .execute(ExecutionRequest::Apply {
                action: action(ActionKind::Delete, "old.py", None),
            })
            .await
            .unwrap();
        assert_eq!(again.status, ExecutionStatus::Failed);
    }

    #[tokio::test]
    async fn apply_routes_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec![]);

        let created = exec
            .execute(ExecutionRequest::Apply {
                action: action(ActionKind::Test, "tests/test_auth.py", Some("def test_x(): pass\n")),
            })
            .await
            .unwrap();
        assert_eq!(created.status, ExecutionStatus::Success);

        let diff_only = exec
            .execute(ExecutionRequest::Apply {
                action: action(ActionKind::Edit, "a.py", None),
            })
            .await
            .unwrap();
        assert_eq!(diff_only.status, ExecutionStatus::Proposed);

        let comment = exec
            .execute(ExecutionRequest::Apply {
                action: action(ActionKind::PrComment, "a.py", None),
            })
            .await
            .unwrap();
        assert_eq!(comment.status, ExecutionStatus::Skipped);
    }

    #[tokio::test]
    async fn test_command_outside_allowlist_is_denied() {
        let dir = tempfile::tempdir().unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec!["pytest".into()]);
        let result = exec
            .execute(ExecutionRequest::RunTests {
                command: "rm -rf /".into(),
                cwd: None,
            })
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec!["echo".into(), "false".into()]);

        let ok = exec
            .execute(ExecutionRequest::RunTests {
                command: "echo 3 passed".into(),
                cwd: None,
            })
            .await
            .unwrap();
        assert_eq!(ok.status, ExecutionStatus::Success);
        assert_eq!(ok.output.as_deref(), Some("3 passed"));

        let failing = exec
            .execute(ExecutionRequest::RunTests {
                command: "false".into(),
                cwd: None,
            })
            .await
            .unwrap();
        assert_eq!(failing.status, ExecutionStatus::Failed);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn slow_tests_time_out() {
        let dir = tempfile::tempdir().unwrap();
        let exec = LocalActionExecutor::new(dir.path(), vec!["sleep".into()])
            .with_test_timeout(Duration::from_millis(200));
        let result = exec
            .execute(ExecutionRequest::RunTests {
                command: "sleep 5".into(),
                cwd: None,
            })
            .await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }
}
