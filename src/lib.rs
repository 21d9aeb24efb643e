pub mod collaborators;
pub mod config;
pub mod db;
pub mod dto;
pub mod entity;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod money;
pub mod reconciler;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

use axum::{
    Json, Router,
    http::{StatusCode, Uri},
    routing::get,
};

use crate::{
    error::ErrorCode,
    response::ErrorResponse,
    routes::{create_api_router, doc::scalar_docs, health},
    state::AppState,
};

/// Routes, docs and fallback with state bound. Transport layers are added by the binary.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", create_api_router())
        .merge(scalar_docs())
        .fallback(not_found)
        .with_state(state)
}

async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    let body = ErrorResponse::new(ErrorCode::NotFound, format!("no route for {}", uri.path()));
    (StatusCode::NOT_FOUND, Json(body))
}
