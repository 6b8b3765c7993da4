//! The agent loop: a bounded Reasoning → ToolDispatch state machine.
//!
//! 1. **Reason**: send the conversation and the agent tools to the model
//! 2. **Stop** if the reply has no tool calls; its text is the final answer
//! 3. **Dispatch** every tool call in order, appending one observation each
//! 4. Loop back to 1 until `max_iterations` Reasoning steps have run
//!
//! Tool failures never end the session; they become `Error: ...`
//! observations the model can react to. Provider failures do.

use chrono::Utc;
use repolens_core::error::AgentError;
use repolens_core::{
    ActionExecutor, ContextRetriever, Conversation, DomainEvent, EventBus, ExecutionRequest,
    Message, MessageToolCall, Provider, ProviderRequest, ToolChoice, ToolDefinition, WorkspaceId,
    parse_structured,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const DEFAULT_MAX_ITERATIONS: u32 = 5;
const MAX_TEST_OUTPUT_CHARS: usize = 500;
const MAX_LISTED_FILES: usize = 3;

const SYSTEM_PROMPT: &str = "You are an autonomous coding agent.\n\
You can search the codebase, propose edits, and verify fixes.\n\
Always explain your reasoning before taking action.";

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The model replied without tool calls
    NaturalStop,
    IterationBudgetExhausted,
    Cancelled,
}

impl Termination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NaturalStop => "natural_stop",
            Self::IterationBudgetExhausted => "iteration_budget_exhausted",
            Self::Cancelled => "cancelled",
        }
    }
}

/// One dispatched tool call and what the model was told about it.
#[derive(Debug, Clone, Serialize)]
pub struct ToolObservation {
    pub tool_name: String,
    pub arguments: String,
    pub observation: String,
}

/// One Reasoning step and the dispatch that followed it.
#[derive(Debug, Clone, Serialize)]
pub struct AgentTurn {
    pub iteration: u32,
    pub assistant_text: String,
    pub observations: Vec<ToolObservation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentOutcome {
    pub final_answer: String,
    /// Arguments of every `edit_file` call the executor accepted
    pub actions_taken: Vec<Value>,
    /// Reasoning steps performed
    pub iterations: u32,
    pub termination: Termination,
    pub turns: Vec<AgentTurn>,
}

enum State {
    Reasoning,
    ToolDispatch(Message),
    Terminated(Termination),
}

pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    model: String,
    retriever: Arc<dyn ContextRetriever>,
    executor: Arc<dyn ActionExecutor>,
    max_iterations: u32,
    temperature: f32,
    max_tokens: Option<u32>,
    events: Option<Arc<EventBus>>,
}

impl AgentLoop {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        retriever: Arc<dyn ContextRetriever>,
        executor: Arc<dyn ActionExecutor>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            retriever,
            executor,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            temperature: 0.2,
            max_tokens: None,
            events: None,
        }
    }

    /// Values below 1 are raised to 1.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Run one session for `query` against `workspace`.
    pub async fn run(
        &self,
        workspace: &WorkspaceId,
        query: &str,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome, AgentError> {
        info!(workspace = %workspace, max_iterations = self.max_iterations, "Agent session started");

        let mut conversation = Conversation::seeded(SYSTEM_PROMPT, query);
        let tools = agent_tools();
        let mut iteration = 0u32;
        let mut last_text = String::new();
        let mut actions_taken = Vec::new();
        let mut turns: Vec<AgentTurn> = Vec::new();
        let mut state = State::Reasoning;

        let termination = loop {
            state = match state {
                State::Reasoning if cancel.is_cancelled() => State::Terminated(Termination::Cancelled),
                State::Reasoning if iteration >= self.max_iterations => {
                    State::Terminated(Termination::IterationBudgetExhausted)
                }
                State::Reasoning => {
                    iteration += 1;
                    debug!(iteration, "Agent reasoning step");

                    let mut request =
                        ProviderRequest::new(&self.model, conversation.messages.clone())
                            .with_tools(tools.clone(), ToolChoice::Auto);
                    request.temperature = self.temperature;
                    request.max_tokens = self.max_tokens;

                    let result = tokio::select! {
                        _ = cancel.cancelled() => {
                            info!(iteration, "Agent cancelled during model call");
                            break Termination::Cancelled;
                        }
                        r = self.provider.complete(request) => r,
                    };
                    let response =
                        result.map_err(|source| AgentError::Reasoning { iteration, source })?;

                    let message = response.message;
                    last_text = message.content.clone();
                    turns.push(AgentTurn {
                        iteration,
                        assistant_text: message.content.clone(),
                        observations: Vec::new(),
                    });

                    if message.tool_calls.is_empty() {
                        conversation.push(message);
                        State::Terminated(Termination::NaturalStop)
                    } else {
                        State::ToolDispatch(message)
                    }
                }
                State::ToolDispatch(message) => {
                    let calls = message.tool_calls.clone();
                    conversation.push(message);

                    for call in &calls {
                        let (observation, success) = self
                            .dispatch(workspace, call, &mut actions_taken)
                            .await;
                        self.publish(DomainEvent::ToolDispatched {
                            tool_name: call.name.clone(),
                            iteration,
                            success,
                            timestamp: Utc::now(),
                        });
                        conversation.push(Message::tool_result(&call.id, &observation));
                        if let Some(turn) = turns.last_mut() {
                            turn.observations.push(ToolObservation {
                                tool_name: call.name.clone(),
                                arguments: call.arguments.clone(),
                                observation,
                            });
                        }
                    }
                    State::Reasoning
                }
                State::Terminated(t) => break t,
            };
        };

        let final_answer = match termination {
            Termination::IterationBudgetExhausted => {
                warn!(iterations = iteration, "Agent iteration budget exhausted");
                format!("Max iterations reached. Current status: {last_text}")
            }
            Termination::NaturalStop | Termination::Cancelled => last_text,
        };

        self.publish(DomainEvent::AgentTerminated {
            termination: termination.as_str().to_string(),
            iterations: iteration,
            timestamp: Utc::now(),
        });
        info!(
            iterations = iteration,
            termination = termination.as_str(),
            actions = actions_taken.len(),
            "Agent session finished"
        );

        Ok(AgentOutcome {
            final_answer,
            actions_taken,
            iterations: iteration,
            termination,
            turns,
        })
    }

    /// Execute one tool call. Returns the observation and whether it succeeded.
    async fn dispatch(
        &self,
        workspace: &WorkspaceId,
        call: &MessageToolCall,
        actions_taken: &mut Vec<Value>,
    ) -> (String, bool) {
        let args: Map<String, Value> = match parse_structured(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Malformed tool arguments");
                return (format!("Error: malformed arguments for {}: {e}", call.name), false);
            }
        };

        match call.name.as_str() {
            "search_codebase" => {
                let Some(query) = str_arg(&args, "query") else {
                    return missing("search_codebase", "query");
                };
                match self.retriever.search(workspace, query).await {
                    Ok(results) => {
                        let files: Vec<&str> = results
                            .iter()
                            .take(MAX_LISTED_FILES)
                            .map(|r| r.file_path.as_str())
                            .collect();
                        (
                            format!("Found {} relevant files: {}", results.len(), files.join(", ")),
                            true,
                        )
                    }
                    Err(e) => (format!("Error: {e}"), false),
                }
            }
            "edit_file" => {
                let (Some(file_path), Some(content)) =
                    (str_arg(&args, "file_path"), str_arg(&args, "content"))
                else {
                    return missing("edit_file", "file_path and content");
                };
                let request = ExecutionRequest::WriteFile {
                    file_path: file_path.to_string(),
                    content: content.to_string(),
                };
                match self.executor.execute(request).await {
                    Ok(report) => {
                        actions_taken.push(Value::Object(args.clone()));
                        (format!("Edit result: {}", report.status), true)
                    }
                    Err(e) => (format!("Error: {e}"), false),
                }
            }
            "run_tests" => {
                let Some(command) = str_arg(&args, "command") else {
                    return missing("run_tests", "command");
                };
                let request = ExecutionRequest::RunTests {
                    command: command.to_string(),
                    cwd: str_arg(&args, "cwd").map(String::from),
                };
                match self.executor.execute(request).await {
                    Ok(report) => {
                        let output: String = report
                            .output
                            .unwrap_or_default()
                            .chars()
                            .take(MAX_TEST_OUTPUT_CHARS)
                            .collect();
                        (format!("Test output: {output}"), true)
                    }
                    Err(e) => (format!("Error: {e}"), false),
                }
            }
            other => (format!("Unknown tool: {other}"), false),
        }
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

fn str_arg<'a>(args: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    args.get(key).and_then(Value::as_str)
}

fn missing(tool: &str, what: &str) -> (String, bool) {
    (format!("Error: {tool} requires {what}"), false)
}

/// The tools the agent may call.
pub fn agent_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "search_codebase",
            "Search for relevant code snippets",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Semantic search query"}
                },
                "required": ["query"]
            }),
        ),
        ToolDefinition::new(
            "edit_file",
            "Propose an edit to a file",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "content": {"type": "string", "description": "Full new file content"},
                    "reasoning": {"type": "string"}
                },
                "required": ["file_path", "content"]
            }),
        ),
        ToolDefinition::new(
            "run_tests",
            "Execute a test command",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string", "default": "pytest"},
                    "cwd": {"type": "string"}
                },
                "required": ["command"]
            }),
        ),
    ]
}
