pub mod config;
pub mod dispatch;
mod error;
pub mod helpers;
pub mod outbound;
mod routes;
mod validation;

use axum::{
    Router,
    http::StatusCode,
    routing::{get, post},
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::dispatch::Dispatcher;

pub struct AppState {
    pub db: gamewatch_db::Database,
    pub dispatcher: Dispatcher,
}

/// Create the application router with the given database and dispatcher
pub fn create_app(
    db: gamewatch_db::Database,
    dispatcher: Dispatcher,
    request_body_limit: usize,
    request_timeout: Duration,
) -> Router {
    let state = Arc::new(AppState { db, dispatcher });

    Router::new()
        .route("/health", get(|| async { StatusCode::OK }))
        .route(
            "/game",
            post(routes::submit_update).delete(routes::submit_deletion),
        )
        .route("/sms", post(routes::inbound_message))
        .route("/sms/errors", post(routes::delivery_error))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(RequestBodyLimitLayer::new(request_body_limit))
        .with_state(state)
}
