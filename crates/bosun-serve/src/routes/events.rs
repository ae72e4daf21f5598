use crate::AppState;
use crate::middleware::correlation::CorrelationId;
use crate::routes::error::{invalid_input, map_error};
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use bosun_core::error::EventError;
use bosun_core::events::EventRepository;
use bosun_core::store::Store;
use bosun_core::types::{Acknowledgement, Event, EventFilter, EventId};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

const DEFAULT_EVENTS_LIMIT: usize = 20;
const MAX_EVENTS_LIMIT: usize = 100;
const DEFAULT_OPERATOR: &str = "unknown";

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct EventsQuery {
    pub limit: Option<usize>,
    pub acknowledged: Option<bool>,
    pub vessel_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
pub struct AcknowledgeQuery {
    pub operator: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/{id}", get(get_event))
        .route(
            "/events/{id}/acknowledge",
            get(acknowledge).post(acknowledge),
        )
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/api/v1/events",
    params(EventsQuery),
    responses((status = 200, body = Vec<Event>))
)]
pub(crate) async fn list_events(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Query(query): Query<EventsQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_EVENTS_LIMIT);
    if limit == 0 || limit > MAX_EVENTS_LIMIT {
        return invalid_input(
            format!("limit must be between 1 and {MAX_EVENTS_LIMIT}"),
            Some(correlation.0),
        )
        .into_response();
    }
    let filter = EventFilter {
        vessel_id: query.vessel_id.filter(|vessel| !vessel.trim().is_empty()),
        acknowledged: query.acknowledged,
        limit,
    };
    match state
        .store(move |store| Ok(store.events().list(&filter)?))
        .await
    {
        Ok(events) => Json(events).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    params(("id" = i64, Path, description = "Event id")),
    responses((status = 200, body = Event), (status = 404, description = "Unknown event"))
)]
pub(crate) async fn get_event(
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
            store
                .events()
                .get(event_id)?
                .ok_or_else(|| EventError::NotFound.into())
        })
        .await;
    match result {
        Ok(event) => Json(event).into_response(),
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}

/// Acknowledging twice keeps the first operator and reports `changed: false`.
#[utoipa::path(
    post,
    path = "/api/v1/events/{id}/acknowledge",
    params(("id" = i64, Path, description = "Event id"), AcknowledgeQuery),
    responses(
        (status = 200, body = Acknowledgement),
        (status = 404, description = "Unknown event")
    )
)]
pub(crate) async fn acknowledge(
    State(state): State<AppState>,
    Extension(correlation): Extension<CorrelationId>,
    Path(id): Path<String>,
    Query(query): Query<AcknowledgeQuery>,
) -> Response {
    let event_id = match id.parse::<EventId>() {
        Ok(event_id) => event_id,
        Err(err) => return invalid_input(err.to_string(), Some(correlation.0)).into_response(),
    };
    let operator = query
        .operator
        .filter(|operator| !operator.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OPERATOR.to_string());
    let result = state
        .store(move |store| Ok(store.events().acknowledge(event_id, &operator, Utc::now())?))
        .await;
    match result {
        Ok(ack) => {
            if ack.changed {
                info!(event_id = %event_id, "event acknowledged");
            }
            Json(ack).into_response()
        }
        Err(err) => map_error(&err, Some(correlation.0)).into_response(),
    }
}
