use axum::{
    http::StatusCode,
    middleware,
    routing::{any, get},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::server::rest::{
    handlers, logging_middleware::request_logging_middleware, middleware::user_middleware,
    openapi::ApiDoc,
};
use crate::shared::models::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new().route("/health", get(health));

    let protected_routes = Router::new()
        .route("/shells", any(handlers::shells::shells))
        .route_layer(middleware::from_fn_with_state(state.clone(), user_middleware));

    public_routes
        .merge(protected_routes)
        .with_state(state)
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
