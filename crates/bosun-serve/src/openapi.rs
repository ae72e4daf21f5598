use utoipa::OpenApi;

use crate::routes::analyses::{AnalyzeRequest, RecentQuery};
use crate::routes::events::{AcknowledgeQuery, EventsQuery};
use crate::routes::health::Health;
use crate::routes::tools::ToolList;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bosun_core::types::{
    Acknowledgement, Analysis, AnalysisId, AnalysisStatus, AnalysisSummary, Event, EventId,
    ToolSpec,
};
use bosun_mcp::protocol::ToolCallRequest;

#[derive(OpenApi)]
#[openapi(
    info(title = "bosun", description = "Maritime event analysis API"),
    paths(
        crate::routes::analyses::analyze,
        crate::routes::analyses::list_recent,
        crate::routes::analyses::latest_for_event,
        crate::routes::events::list_events,
        crate::routes::events::get_event,
        crate::routes::events::acknowledge,
        crate::routes::tools::list_tools,
        crate::routes::tools::call_tool,
        crate::routes::health::health
    ),
    components(schemas(
        Analysis,
        AnalysisSummary,
        AnalysisStatus,
        AnalyzeRequest,
        RecentQuery,
        Event,
        EventsQuery,
        Acknowledgement,
        AcknowledgeQuery,
        ToolSpec,
        ToolList,
        ToolCallRequest,
        Health,
        EventId,
        AnalysisId
    ))
)]
struct ApiDoc;

pub fn generate_spec() -> String {
    ApiDoc::openapi()
        .to_pretty_json()
        .unwrap_or_else(|_| "{}".to_string())
}

pub fn router() -> Router {
    Router::new().route("/api/openapi.json", get(openapi_json))
}

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
