use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, tool_error};
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use bosun_core::types::ToolSpec;
use bosun_mcp::catalog::tool_specs;
use bosun_mcp::protocol::ToolCallRequest;
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ToolList {
    pub tools: Vec<ToolSpec>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/tools", get(list_tools))
        .route("/tools/call", post(call_tool))
        .with_state(state)
}

#[utoipa::path(get, path = "/tools", responses((status = 200, body = ToolList)))]
pub(crate) async fn list_tools() -> Json<ToolList> {
    Json(ToolList {
        tools: tool_specs(),
    })
}

#[utoipa::path(
    post,
    path = "/tools/call",
    request_body = ToolCallRequest,
    responses(
        (status = 200, description = "Tool output"),
        (status = 400, description = "Invalid arguments"),
        (status = 404, description = "Unknown tool")
    )
)]
pub(crate) async fn call_tool(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    payload: Result<Json<ToolCallRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return invalid_input(rejection.body_text(), Some(correlation.0)).into_response();
        }
    };
    debug!(tool = %request.name, "tool call over http");
    match state
        .data_tools
        .execute(&request.name, request.arguments)
        .await
    {
        Ok(output) => Json(output).into_response(),
        Err(err) => tool_error(&err, Some(correlation.0)).into_response(),
    }
}
