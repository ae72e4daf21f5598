use crate::error::ToolError;
use crate::types::{ToolCall, ToolResult, ToolSpec};
use async_trait::async_trait;

/// Declared read-only data tools the model may call.
///
/// `call` never fails outright: argument, lookup and transport errors are all
/// carried inside the returned [`ToolResult`] so the conversation can continue.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError>;

    async fn call(&self, call: &ToolCall) -> ToolResult;
}
