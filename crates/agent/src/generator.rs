//! The action generator: one tool-calling model request turned into
//! structured [`Action`]s.

use crate::goal::AnalysisGoal;
use repolens_core::error::StructuredOutputError;
use repolens_core::{
    Action, ActionKind, Message, MessageToolCall, Provider, ProviderRequest, RetrievedContext,
    ToolChoice, ToolDefinition, parse_structured,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

const MAX_CONTEXTS: usize = 5;
const MAX_CONTEXT_CHARS: usize = 2000;
const DEFAULT_CONFIDENCE: f32 = 0.85;
const NO_REASONING: &str = "No additional reasoning provided";

pub struct ActionGenerator {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl ActionGenerator {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.2,
            max_tokens: 4096,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Ask the model for actions addressing `query`.
    ///
    /// `tools` replaces [`default_tools`] when given. Provider failures yield
    /// an empty list; individual malformed tool calls are skipped.
    pub async fn generate(
        &self,
        query: &str,
        contexts: &[RetrievedContext],
        goal: AnalysisGoal,
        tools: Option<Vec<ToolDefinition>>,
    ) -> Vec<Action> {
        let tools = tools.unwrap_or_else(default_tools);
        let request = ProviderRequest::new(
            &self.model,
            vec![
                Message::system(system_prompt(query, goal)),
                Message::user(format_context(query, contexts)),
            ],
        )
        .with_tools(tools, ToolChoice::Auto)
        .with_sampling(self.temperature, self.max_tokens);

        let response = match self.provider.complete(request).await {
            Ok(r) => r,
            Err(e) => {
                warn!(goal = %goal, error = %e, "Action generation failed");
                return Vec::new();
            }
        };

        let reasoning = match response.message.content.trim() {
            "" => NO_REASONING.to_string(),
            text => text.to_string(),
        };

        let actions: Vec<Action> = response
            .message
            .tool_calls
            .iter()
            .filter_map(|call| match action_from_call(call, &reasoning) {
                Ok(action) => Some(action),
                Err(e) => {
                    warn!(tool = %call.name, error = %e, "Skipping unparseable tool call");
                    None
                }
            })
            .collect();

        info!(goal = %goal, actions = actions.len(), "Actions generated");
        actions
    }
}

/// Convert one tool call into an action.
pub fn action_from_call(
    call: &MessageToolCall,
    reasoning: &str,
) -> Result<Action, StructuredOutputError> {
    let args: Map<String, Value> = if call.arguments.trim().is_empty() {
        Map::new()
    } else {
        parse_structured(&call.arguments)?
    };

    let kind = ActionKind::from_tool_name(&call.name);
    if kind.is_unmapped() {
        warn!(tool = %call.name, "Unmapped tool name, rendering as edit");
    } else {
        debug!(tool = %call.name, kind = %kind, "Mapped tool call");
    }

    let confidence = args
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| (c as f32).clamp(0.0, 1.0))
        .unwrap_or(DEFAULT_CONFIDENCE);

    Ok(Action {
        kind,
        target_file: first_str(&args, &["file_path", "test_file", "path"])
            .unwrap_or_else(|| "unknown".into()),
        description: first_str(&args, &["explanation", "description", "reason", "comment"])
            .unwrap_or_default(),
        diff: first_str(&args, &["replacement", "diff"]),
        new_content: first_str(&args, &["content", "test_code", "new_content"]),
        reasoning: reasoning.to_string(),
        confidence,
    })
}

fn first_str(args: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| args.get(*k).and_then(Value::as_str))
        .map(String::from)
}

fn system_prompt(query: &str, goal: AnalysisGoal) -> String {
    format!(
        "You are a senior software engineer performing {goal}.\n{}\n\n\
         Strictly follow these rules:\n\
         1. Only propose actions that directly address the user's query: '{query}'\n\
         2. Use the provided code context to identify specific files and locations.\n\
         3. Do not give generic advice. Be specific.\n\
         4. Put complete code in the tool arguments; escape quotes so the arguments stay valid JSON.",
        goal.action_instruction()
    )
}

/// Render the query and the top contexts for the model.
pub fn format_context(query: &str, contexts: &[RetrievedContext]) -> String {
    let mut out = format!("Query: {query}\n\nRelevant Code Context:\n");
    for (i, ctx) in contexts.iter().take(MAX_CONTEXTS).enumerate() {
        let meta = &ctx.metadata;
        let content: String = ctx.content.chars().take(MAX_CONTEXT_CHARS).collect();
        out.push_str(&format!(
            "\n--- Context {} ---\nFile: {} (lines {}-{})\nType: {}\nContent:\n{}\n",
            i + 1,
            meta.file_path,
            meta.line_start,
            meta.line_end,
            meta.construct_kind.as_str(),
            content
        ));
    }
    out
}

/// Tool schemas offered to the model by default.
pub fn default_tools() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::new(
            "edit_file",
            "Propose a code edit",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "line_start": {"type": "integer"},
                    "line_end": {"type": "integer"},
                    "replacement": {"type": "string"},
                    "explanation": {"type": "string"},
                    "confidence": {"type": "number", "minimum": 0, "maximum": 1}
                },
                "required": ["file_path", "replacement", "explanation"]
            }),
        ),
        ToolDefinition::new(
            "create_test",
            "Generate a test case",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "test_file": {"type": "string"},
                    "test_code": {"type": "string"},
                    "description": {"type": "string"}
                },
                "required": ["test_file", "test_code", "description"]
            }),
        ),
        ToolDefinition::new(
            "delete_file",
            "Recommend deleting a file",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "reason": {"type": "string"}
                },
                "required": ["file_path", "reason"]
            }),
        ),
        ToolDefinition::new(
            "pr_comment",
            "Add a review comment to a pull request",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "pr_id": {"type": "string"},
                    "comment": {"type": "string"},
                    "file_path": {"type": "string"},
                    "line": {"type": "integer"}
                },
                "required": ["pr_id", "comment"]
            }),
        ),
    ]
}
