use crate::http::{join_url, parse_http_error, transport_error};
use async_trait::async_trait;
use bosun_core::config::ModelConfig;
use bosun_core::error::ModelError;
use bosun_core::model::{Conversation, Message, ModelDriver, ModelTurn};
use bosun_core::types::{ToolCall, ToolSpec};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Talks to Ollama's `/api/chat` with streaming disabled.
pub struct OllamaDriver {
    client: reqwest::Client,
    chat_url: String,
    model: String,
    timeout: Duration,
}

impl OllamaDriver {
    pub fn new(config: &ModelConfig) -> Result<Self, ModelError> {
        let timeout = config.timeout();
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ModelError::Unavailable {
                message: err.to_string(),
            })?;
        Ok(Self {
            client,
            chat_url: join_url(&config.base_url, "/api/chat"),
            model: config.name.clone(),
            timeout,
        })
    }
}

#[async_trait]
impl ModelDriver for OllamaDriver {
    fn model_used(&self) -> String {
        format!("ollama/{}", self.model)
    }

    async fn converse(
        &self,
        conversation: &Conversation,
        tools: &[ToolSpec],
    ) -> Result<ModelTurn, ModelError> {
        let body = build_request(&self.model, conversation, tools);
        debug!(
            messages = body.messages.len(),
            tools = body.tools.len(),
            "sending chat request"
        );
        let response = self
            .client
            .post(&self.chat_url)
            .json(&body)
            .send()
            .await
            .map_err(|err| transport_error(&err, self.timeout))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|err| transport_error(&err, self.timeout))?;
        if !(200..300).contains(&status) {
            return Err(parse_http_error(status, &text));
        }
        parse_response(&text)
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<WireToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

impl WireMessage {
    fn plain(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    /// Objects normally, but some models send a JSON-encoded string.
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireToolFunction<'a>,
}

#[derive(Debug, Serialize)]
struct WireToolFunction<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: WireMessage,
}

pub(crate) fn build_request<'a>(
    model: &'a str,
    conversation: &Conversation,
    tools: &'a [ToolSpec],
) -> ChatRequest<'a> {
    let mut messages = vec![WireMessage::plain("system", conversation.system())];
    for message in conversation.messages() {
        messages.push(match message {
            Message::User { content } => WireMessage::plain("user", content),
            Message::Assistant {
                content,
                tool_calls,
            } => WireMessage {
                role: "assistant".to_string(),
                content: content.clone(),
                tool_calls: tool_calls
                    .iter()
                    .map(|call| WireToolCall {
                        function: WireFunction {
                            name: call.tool_name.clone(),
                            arguments: call.arguments.clone(),
                        },
                    })
                    .collect(),
                tool_name: None,
            },
            Message::Tool { name, content } => WireMessage {
                tool_name: Some(name.clone()),
                ..WireMessage::plain("tool", content)
            },
        });
    }
    ChatRequest {
        model,
        messages,
        stream: false,
        tools: tools
            .iter()
            .map(|spec| WireTool {
                kind: "function",
                function: WireToolFunction {
                    name: &spec.name,
                    description: &spec.description,
                    parameters: &spec.input_schema,
                },
            })
            .collect(),
    }
}

pub(crate) fn parse_response(body: &str) -> Result<ModelTurn, ModelError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|err| ModelError::InvalidResponse {
            message: format!("failed to parse chat response: {err}"),
        })?;
    let message = response.message;
    if message.tool_calls.is_empty() {
        return Ok(ModelTurn::Final {
            text: message.content,
        });
    }
    let calls = message
        .tool_calls
        .into_iter()
        .map(|call| ToolCall::new(call.function.name, call.function.arguments))
        .collect();
    Ok(ModelTurn::ToolCalls {
        text: message.content,
        calls,
    })
}
