// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@oxidity.com>

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name of the synthetic result that replaces an oversized batch.
pub const ERROR_HANDLER_ACTION: &str = "error_handler";

/// One action the planner asked for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub args: Map<String, Value>,
    /// Set when the planner's argument text could not be read as an object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg_error: Option<String>,
}

/// Outcome of one action. Failures carry `{"error": .., "kind": ..}` in `output`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// `None` for the synthetic oversized-payload result.
    pub call_id: Option<String>,
    pub name: String,
    pub output: Value,
}

impl ActionResult {
    pub fn ok(request: &ActionRequest, output: Value) -> Self {
        Self {
            call_id: Some(request.call_id.clone()),
            name: request.name.clone(),
            output,
        }
    }

    pub fn error(request: &ActionRequest, message: impl Into<String>, kind: &str) -> Self {
        Self {
            call_id: Some(request.call_id.clone()),
            name: request.name.clone(),
            output: json!({ "error": message.into(), "kind": kind }),
        }
    }

    pub fn synthetic_error(message: impl Into<String>, kind: &str) -> Self {
        Self {
            call_id: None,
            name: ERROR_HANDLER_ACTION.to_string(),
            output: json!({ "error": message.into(), "kind": kind }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.output.get("error").is_some()
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.output.get("kind").and_then(Value::as_str)
    }
}

/// A planner-visible history entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ConversationEntry {
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        actions: Vec<ActionRequest>,
    },
    ActionResults {
        results: Vec<ActionResult>,
    },
}

impl ConversationEntry {
    pub fn is_user(&self) -> bool {
        matches!(self, ConversationEntry::User { .. })
    }
}

/// Function declaration advertised to the planner.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// JSON-schema object.
    pub parameters: Value,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlannerReply {
    pub text: Option<String>,
    pub actions: Vec<ActionRequest>,
    pub usage_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_results_carry_kind_tag() {
        let req = ActionRequest {
            call_id: "c1".into(),
            name: "open_channel".into(),
            args: Map::new(),
            arg_error: None,
        };
        let res = ActionResult::error(&req, "User denied execution of tool: open_channel", "denied");
        assert!(res.is_error());
        assert_eq!(res.error_kind(), Some("denied"));
        assert_eq!(res.call_id.as_deref(), Some("c1"));

        let ok = ActionResult::ok(&req, json!({"funding_txid": "ab"}));
        assert!(!ok.is_error());
    }

    #[test]
    fn synthetic_result_has_no_call_id() {
        let res = ActionResult::synthetic_error("too large", "payload_too_large");
        assert_eq!(res.name, ERROR_HANDLER_ACTION);
        assert!(res.call_id.is_none());
    }
}
