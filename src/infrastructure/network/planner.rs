// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

//! Chat-completions planner with function tools.
//!
//! History is rendered as OpenAI-compatible messages: the system prompt first,
//! then user turns, assistant turns carrying `tool_calls`, and one `tool`
//! message per call id. When a batch of action results was replaced by a
//! single synthetic result, that result answers every call id of the
//! preceding assistant turn so the transcript stays well-formed.

use crate::domain::conversation::{
    ActionRequest, ActionResult, ConversationEntry, PlannerReply, ToolDeclaration,
};
use crate::domain::error::AppError;
use crate::infrastructure::network::http::{build_client, error_message, join_url};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::time::Duration;

#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(
        &self,
        system_prompt: &str,
        history: &[ConversationEntry],
        tools: &[ToolDeclaration],
    ) -> Result<PlannerReply, AppError>;
}

#[derive(Clone)]
pub struct ChatPlanner {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatPlanner {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        if api_key.trim().is_empty() {
            return Err(AppError::Initialization(
                "planner API key missing (PLANNER_API_KEY)".to_string(),
            ));
        }
        Ok(Self {
            client: build_client(None, timeout)?,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl Planner for ChatPlanner {
    async fn plan(
        &self,
        system_prompt: &str,
        history: &[ConversationEntry],
        tools: &[ToolDeclaration],
    ) -> Result<PlannerReply, AppError> {
        let body = build_request_body(&self.model, system_prompt, history, tools);
        let resp = self
            .client
            .post(join_url(&self.base_url, "/chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Planner {
                message: format!("request failed: {e}"),
                recoverable: true,
            })?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| AppError::Planner {
            message: format!("failed to read response: {e}"),
            recoverable: true,
        })?;
        if !status.is_success() {
            // Credentials and permissions do not fix themselves between ticks.
            let recoverable = !matches!(status.as_u16(), 401 | 403);
            return Err(AppError::Planner {
                message: format!("status {}: {}", status.as_u16(), error_message(&text)),
                recoverable,
            });
        }
        parse_completion(&text)
    }
}

pub fn build_request_body(
    model: &str,
    system_prompt: &str,
    history: &[ConversationEntry],
    tools: &[ToolDeclaration],
) -> Value {
    let mut messages = vec![json!({ "role": "system", "content": system_prompt })];
    messages.extend(build_transcript_messages(history));
    let tools = tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                }
            })
        })
        .collect::<Vec<_>>();
    json!({
        "model": model,
        "messages": messages,
        "tool_choice": "auto",
        "tools": tools,
    })
}

pub fn build_transcript_messages(history: &[ConversationEntry]) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut pending_call_ids: Vec<String> = Vec::new();
    for entry in history {
        match entry {
            ConversationEntry::User { content } => {
                pending_call_ids.clear();
                messages.push(json!({ "role": "user", "content": content }));
            }
            ConversationEntry::Assistant { content, actions } => {
                pending_call_ids = actions.iter().map(|a| a.call_id.clone()).collect();
                let mut message = json!({ "role": "assistant", "content": content });
                if !actions.is_empty() {
                    message["tool_calls"] = Value::Array(
                        actions
                            .iter()
                            .map(|a| {
                                json!({
                                    "id": a.call_id,
                                    "type": "function",
                                    "function": {
                                        "name": a.name,
                                        "arguments": Value::Object(a.args.clone()).to_string(),
                                    }
                                })
                            })
                            .collect(),
                    );
                }
                messages.push(message);
            }
            ConversationEntry::ActionResults { results } => {
                messages.extend(tool_messages(&pending_call_ids, results));
                pending_call_ids.clear();
            }
        }
    }
    messages
}

fn tool_messages(call_ids: &[String], results: &[ActionResult]) -> Vec<Value> {
    let fallback = results
        .iter()
        .find(|r| r.call_id.is_none())
        .map(|r| r.output.to_string());
    call_ids
        .iter()
        .map(|id| {
            let content = results
                .iter()
                .find(|r| r.call_id.as_deref() == Some(id.as_str()))
                .map(|r| r.output.to_string())
                .or_else(|| fallback.clone())
                .unwrap_or_else(|| json!({ "error": "no result recorded" }).to_string());
            json!({ "role": "tool", "tool_call_id": id, "content": content })
        })
        .collect()
}

#[derive(Deserialize)]
struct CompletionWire {
    #[serde(default)]
    choices: Vec<ChoiceWire>,
    #[serde(default)]
    usage: Option<UsageWire>,
}

#[derive(Deserialize)]
struct ChoiceWire {
    message: MessageWire,
}

#[derive(Deserialize)]
struct MessageWire {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallWire>>,
}

#[derive(Deserialize)]
struct ToolCallWire {
    #[serde(default)]
    id: Option<String>,
    function: FunctionWire,
}

#[derive(Deserialize)]
struct FunctionWire {
    name: String,
    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Deserialize)]
struct UsageWire {
    #[serde(default)]
    total_tokens: u64,
}

pub fn parse_completion(raw: &str) -> Result<PlannerReply, AppError> {
    let response: CompletionWire = serde_json::from_str(raw).map_err(|e| AppError::Planner {
        message: format!("failed to parse completion json: {e}"),
        recoverable: true,
    })?;
    let usage_tokens = response.usage.map(|u| u.total_tokens).unwrap_or(0);
    let choice = response.choices.into_iter().next().ok_or(AppError::Planner {
        message: "completion contained no choices".to_string(),
        recoverable: true,
    })?;

    let mut actions = Vec::new();
    for (index, call) in choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .enumerate()
    {
        // A malformed call is answered on its own; its siblings still run.
        let (args, arg_error) =
            match parse_tool_arguments(call.function.arguments.as_deref().unwrap_or("{}")) {
                Ok(args) => (args, None),
                Err(message) => {
                    tracing::warn!(
                        target: "planner",
                        tool = %call.function.name,
                        error = %message,
                        "unreadable tool arguments"
                    );
                    (Map::new(), Some(message))
                }
            };
        actions.push(ActionRequest {
            call_id: call
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| format!("call_{index}")),
            name: call.function.name,
            args,
            arg_error,
        });
    }

    Ok(PlannerReply {
        text: choice.message.content.filter(|c| !c.trim().is_empty()),
        actions,
        usage_tokens,
    })
}

/// Accepts plain objects, objects wrapped in a markdown fence and
/// JSON strings that themselves contain an object.
pub fn parse_tool_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }
    let mut candidates = vec![trimmed.to_string()];
    if let Some(stripped) = strip_markdown_code_fence(trimmed) {
        candidates.push(stripped);
    }

    let mut last_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(&candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(Value::String(nested)) => {
                if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(nested.trim()) {
                    return Ok(map);
                }
                last_error = Some("arguments must be a JSON object".to_string());
            }
            Ok(_) => last_error = Some("arguments must be a JSON object".to_string()),
            Err(e) => last_error = Some(format!("invalid json: {e}")),
        }
    }
    Err(last_error.unwrap_or_else(|| "unparseable arguments".to_string()))
}

fn strip_markdown_code_fence(raw: &str) -> Option<String> {
    if !raw.starts_with("```") {
        return None;
    }
    let mut lines = raw.lines();
    lines.next()?;
    let mut body = lines.collect::<Vec<_>>();
    if body.last().map(|line| line.trim()) != Some("```") {
        return None;
    }
    body.pop();
    Some(body.join("\n").trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(id: &str, name: &str) -> ActionRequest {
        ActionRequest {
            call_id: id.into(),
            name: name.into(),
            args: Map::new(),
            arg_error: None,
        }
    }

    #[test]
    fn parses_tool_calls_text_and_usage() {
        let raw = r#"{
            "choices": [{"message": {
                "content": "Checking balances first.",
                "tool_calls": [
                    {"id": "a1", "type": "function", "function": {"name": "get_wallet_balance", "arguments": "{}"}},
                    {"id": "", "type": "function", "function": {"name": "set_fee_policy", "arguments": "{\"channel_id\":\"1\",\"fee_rate\":3.0}"}}
                ]
            }}],
            "usage": {"total_tokens": 321}
        }"#;
        let reply = parse_completion(raw).unwrap();
        assert_eq!(reply.text.as_deref(), Some("Checking balances first."));
        assert_eq!(reply.usage_tokens, 321);
        assert_eq!(reply.actions.len(), 2);
        assert_eq!(reply.actions[0].call_id, "a1");
        assert_eq!(reply.actions[1].call_id, "call_1");
        assert_eq!(reply.actions[1].args["fee_rate"], json!(3.0));
    }

    #[test]
    fn malformed_arguments_stay_on_their_own_call() {
        let raw = r#"{
            "choices": [{"message": {
                "content": null,
                "tool_calls": [
                    {"id": "a1", "type": "function", "function": {"name": "get_wallet_balance", "arguments": "{}"}},
                    {"id": "a2", "type": "function", "function": {"name": "set_fee_policy", "arguments": "{\"channel_id\": 1, fee_rate"}}
                ]
            }}]
        }"#;
        let reply = parse_completion(raw).unwrap();
        assert_eq!(reply.actions.len(), 2);
        assert!(reply.actions[0].arg_error.is_none());
        assert_eq!(reply.actions[1].call_id, "a2");
        assert!(reply.actions[1].args.is_empty());
        assert!(
            reply.actions[1]
                .arg_error
                .as_deref()
                .unwrap_or_default()
                .starts_with("invalid json")
        );
    }

    #[test]
    fn lenient_argument_parsing() {
        let fenced = "```json\n{\"channel_id\": \"7\"}\n```";
        assert_eq!(parse_tool_arguments(fenced).unwrap()["channel_id"], "7");

        let nested = r#""{\"limit\": 5}""#;
        assert_eq!(parse_tool_arguments(nested).unwrap()["limit"], 5);

        assert!(parse_tool_arguments("").unwrap().is_empty());
        assert!(parse_tool_arguments("[1,2]").is_err());
        assert!(parse_tool_arguments("{oops").is_err());
    }

    #[test]
    fn synthetic_result_answers_every_pending_call() {
        let history = vec![
            ConversationEntry::User {
                content: "assess".into(),
            },
            ConversationEntry::Assistant {
                content: None,
                actions: vec![request("a", "list_channels"), request("b", "list_peers")],
            },
            ConversationEntry::ActionResults {
                results: vec![ActionResult::synthetic_error("too large", "payload_too_large")],
            },
        ];
        let messages = build_transcript_messages(&history);
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[2]["role"], "tool");
        assert_eq!(messages[2]["tool_call_id"], "a");
        assert_eq!(messages[3]["tool_call_id"], "b");
        assert!(messages[3]["content"].as_str().unwrap().contains("too large"));
    }

    #[test]
    fn request_body_lists_tools_after_system_prompt() {
        let tools = vec![ToolDeclaration {
            name: "get_node_info".into(),
            description: "info".into(),
            parameters: json!({"type": "object", "properties": {}}),
        }];
        let body = build_request_body("m", "sys", &[], &tools);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["tools"][0]["function"]["name"], "get_node_info");
        assert_eq!(body["tool_choice"], "auto");
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = ChatPlanner::new("https://x", "m", " ".into(), Duration::from_secs(1))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "initialization");
    }
}
