pub mod health;
pub mod sessions;
pub mod tools;

use std::sync::Arc;

use axum::extract::FromRequest;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::errors::AppError;
use crate::state::AppState;

/// `Json` body extractor whose rejections render as [`AppError::BadRequest`].
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/tools", get(tools::list_tools))
        .route("/sessions", post(sessions::create_session))
        .route(
            "/sessions/:session_id",
            axum::routing::delete(sessions::close_session),
        )
        .route(
            "/sessions/:session_id/events",
            get(sessions::events_stream),
        )
        .route(
            "/sessions/:session_id/elicitations",
            get(sessions::list_elicitations),
        )
        .route(
            "/sessions/:session_id/elicitations/:elicitation_id",
            post(sessions::respond),
        )
        .route(
            "/sessions/:session_id/tools/book_table",
            post(tools::book_table),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
