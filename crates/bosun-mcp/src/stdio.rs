use crate::catalog::tool_specs;
use crate::data::DataTools;
use crate::protocol::{McpRequest, McpResponse, ToolCallRequest};
use bosun_core::store::StoreProvider;
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

/// Serves one JSON request per input line until EOF, answering each with one
/// JSON line.
pub async fn run_stdio<P, R, W>(tools: &DataTools<P>, reader: R, mut writer: W) -> std::io::Result<()>
where
    P: StoreProvider,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<McpRequest>(&line) {
            Ok(request) => handle_request(tools, request).await,
            Err(err) => {
                warn!(error = %err, "unreadable request line");
                McpResponse::error(Value::Null, "invalid_request", err.to_string())
            }
        };
        writer.write_all(response.to_json().as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

pub async fn handle_request<P: StoreProvider>(
    tools: &DataTools<P>,
    request: McpRequest,
) -> McpResponse {
    debug!(method = %request.method, "stdio request");
    match request.method.as_str() {
        "tools/list" => McpResponse::ok(request.id, json!({ "tools": tool_specs() })),
        "tools/call" => {
            let params: ToolCallRequest = match serde_json::from_value(request.params) {
                Ok(params) => params,
                Err(err) => {
                    return McpResponse::error(request.id, "invalid_params", err.to_string());
                }
            };
            match tools.execute(&params.name, params.arguments).await {
                Ok(output) => McpResponse::ok(request.id, output),
                Err(err) => McpResponse::error(request.id, err.code(), err.to_string()),
            }
        }
        other => McpResponse::error(
            request.id,
            "method_not_found",
            format!("unknown method: {other}"),
        ),
    }
}
