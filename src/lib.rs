//! Course permission resolution and timed quiz attempts.
//!
//! Decides what a principal may do on a course and runs quizzes from
//! start through grading, one active attempt per student at a time.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod grading;
pub mod models;
pub mod permissions;
pub mod quizzes;
pub mod routes;
pub mod store;
pub mod teachers;
pub mod timing;

use axum::{extract::DefaultBodyLimit, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Full application: health check, API routes and the HTTP middleware stack.
pub fn app(state: routes::AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(routes::router(state))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
