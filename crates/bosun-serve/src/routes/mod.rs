pub mod analyses;
pub mod error;
pub mod events;
pub mod health;
pub mod tools;

use crate::middleware::correlation::correlation_middleware;
use crate::{AppState, openapi};
use axum::Router;
use axum::middleware;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(analyses::router(state.clone()))
        .merge(events::router(state.clone()));

    Router::new()
        .nest("/api/v1", api)
        .merge(tools::router(state))
        .merge(health::router())
        .merge(openapi::router())
        .route_layer(middleware::from_fn(correlation_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
