use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use bosun_core::analyses::AnalysisRepository;
use bosun_core::error::{AnalysisError, BosunError, EventError};
use bosun_core::events::EventRepository;
use bosun_core::store::Store;
use bosun_core::types::{Analysis, AnalysisSummary, EventId};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const DEFAULT_RECENT_LIMIT: usize = 10;
const MAX_RECENT_LIMIT: usize = 100;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AnalyzeRequest {
    pub event_id: EventId,
    /// Run a fresh analysis even when one already exists.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyses", get(list_recent))
        .route("/events/{id}/analysis", get(latest_for_event))
        .with_state(state)
}

#[utoipa::path(
    post,
    path = "/api/v1/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, body = Analysis),
        (status = 400, description = "Malformed request"),
        (status = 404, description = "Unknown event"),
        (status = 409, description = "Analysis already in progress")
    )
)]
pub(crate) async fn analyze(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return invalid_input(rejection.body_text(), Some(correlation.0)).into_response();
        }
    };
    info!(event_id = %request.event_id, force = request.force, "analysis requested");
    match state.analyzer.analyze(request.event_id, request.force).await {
        Ok(analysis) => Json(analysis).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/analyses",
    params(RecentQuery),
    responses((status = 200, body = Vec<AnalysisSummary>))
)]
pub(crate) async fn list_recent(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<RecentQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 || limit > MAX_RECENT_LIMIT {
        return invalid_input(
            format!("limit must be between 1 and {MAX_RECENT_LIMIT}"),
            Some(correlation.0),
        )
        .into_response();
    }
    let result = state
        .store(move |store| Ok(store.analyses().list_recent(limit)?))
        .await;
    match result {
        Ok(analyses) => Json(analyses).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}/analysis",
    params(("id" = i64, Path, description = "Event id")),
    responses(
        (status = 200, body = Analysis),
        (status = 404, description = "Unknown event or no analysis yet")
    )
)]
pub(crate) async fn latest_for_event(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
) -> Response {
    let event_id = match id.parse::<EventId>() {
        Ok(event_id) => event_id,
        Err(err) => return invalid_input(err.to_string(), Some(correlation.0)).into_response(),
    };
    let result = state
        .store(move |store| {
            if store.events().get(event_id)?.is_none() {
                return Err(BosunError::from(EventError::NotFound));
            }
            store
                .analyses()
                .latest_for_event(event_id)?
                .ok_or_else(|| AnalysisError::NotFound.into())
        })
        .await;
    match result {
        Ok(analysis) => Json(analysis).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}
