use crate::protocol::ToolCallRequest;
use async_trait::async_trait;
use bosun_core::error::ToolError;
use bosun_core::tools::ToolRegistry;
use bosun_core::types::{ToolCall, ToolResult, ToolSpec};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Registry backed by a tool service reachable over HTTP.
pub struct HttpTools {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ToolList {
    tools: Vec<ToolSpec>,
}

impl HttpTools {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ToolError::Unavailable {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn transport(&self, name: &str, err: &reqwest::Error) -> ToolError {
        if err.is_timeout() {
            ToolError::Timeout {
                name: name.to_string(),
                after: self.timeout,
            }
        } else {
            ToolError::Unavailable {
                message: err.to_string(),
            }
        }
    }

    async fn invoke(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let name = call.tool_name.as_str();
        let response = self
            .client
            .post(format!("{}/tools/call", self.base_url))
            .json(&ToolCallRequest {
                name: name.to_string(),
                arguments: call.arguments.clone(),
            })
            .send()
            .await
            .map_err(|err| self.transport(name, &err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| self.transport(name, &err))?;
        match status {
            200..=299 => serde_json::from_str(&body).map_err(|err| ToolError::Execution {
                name: name.to_string(),
                message: format!("unreadable tool output: {err}"),
            }),
            404 => Err(ToolError::UnknownTool {
                name: name.to_string(),
            }),
            400 | 422 => Err(ToolError::InvalidArguments {
                name: name.to_string(),
                message: error_message(&body),
            }),
            _ => Err(ToolError::Execution {
                name: name.to_string(),
                message: format!("HTTP {status}: {}", error_message(&body)),
            }),
        }
    }
}

/// Pulls `message` (or `detail`) out of an error body, else the raw text.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    parsed
        .as_ref()
        .and_then(|value| value.get("message").or_else(|| value.get("detail")))
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl ToolRegistry for HttpTools {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        let response = self
            .client
            .get(format!("{}/tools", self.base_url))
            .send()
            .await
            .map_err(|err| self.transport("tools/list", &err))?;
        if !response.status().is_success() {
            return Err(ToolError::Unavailable {
                message: format!("tool listing returned HTTP {}", response.status().as_u16()),
            });
        }
        let list: ToolList = response.json().await.map_err(|err| ToolError::Unavailable {
            message: format!("unreadable tool listing: {err}"),
        })?;
        Ok(list.tools)
    }

    async fn call(&self, call: &ToolCall) -> ToolResult {
        ToolResult {
            tool_name: call.tool_name.clone(),
            outcome: self.invoke(call).await,
        }
    }
}
