use crate::error::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    #[schema(value_type = Object)]
    pub input_schema: Value,
}

/// A model-issued request. `arguments` is whatever the model sent; it is only
/// trusted after schema validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ToolCall {
    pub tool_name: String,
    #[schema(value_type = Object)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub tool_name: String,
    pub outcome: Result<Value, ToolError>,
}

impl ToolResult {
    pub fn ok(tool_name: impl Into<String>, output: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: Ok(output),
        }
    }

    pub fn err(tool_name: impl Into<String>, error: ToolError) -> Self {
        Self {
            tool_name: tool_name.into(),
            outcome: Err(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// Body fed back into the conversation as the tool message.
    pub fn to_message_content(&self) -> String {
        match &self.outcome {
            Ok(value) => value.to_string(),
            Err(err) => json!({
                "error": { "code": err.code(), "message": err.to_string() }
            })
            .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_results_serialize_as_structured_errors() {
        let result = ToolResult::err(
            "get_events",
            ToolError::UnknownTool {
                name: "get_events".to_string(),
            },
        );
        let body: Value = serde_json::from_str(&result.to_message_content()).unwrap();
        assert_eq!(body["error"]["code"], "unknown_tool");
        assert!(result.is_error());
    }

    #[test]
    fn ok_results_serialize_output_verbatim() {
        let result = ToolResult::ok("get_analysis", json!({"event_id": 3, "analysis": null}));
        assert_eq!(
            result.to_message_content(),
            r#"{"analysis":null,"event_id":3}"#
        );
    }
}
