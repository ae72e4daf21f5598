use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One line of the stdio protocol: `tools/list` or `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    pub id: Value,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpResponse {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpError {
    pub code: String,
    pub message: String,
}

/// Params of `tools/call`, also the body of `POST /tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub arguments: Value,
}

impl McpResponse {
    pub fn ok(id: Value, value: Value) -> Self {
        Self {
            id,
            result: Some(value),
            error: None,
        }
    }

    pub fn error(id: Value, code: &str, message: String) -> Self {
        Self {
            id,
            result: None,
            error: Some(McpError {
                code: code.to_string(),
                message,
            }),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
