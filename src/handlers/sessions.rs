use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::Json;
use serde::Serialize;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, IntervalStream};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::handlers::AppJson;
use crate::models::{ElicitReply, ElicitationRequest};
use crate::state::AppState;

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: String,
}

// POST /sessions
pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create(state.config.event_buffer);
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id().to_string(),
        }),
    )
}

// DELETE /sessions/:id
pub async fn close_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sessions.close(&session_id)?;
    Ok(StatusCode::NO_CONTENT)
}

// GET /sessions/:id/elicitations
pub async fn list_elicitations(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Vec<ElicitationRequest>>, AppError> {
    let session = state.sessions.get(&session_id)?;
    Ok(Json(session.pending()))
}

// POST /sessions/:id/elicitations/:elicitation_id
pub async fn respond(
    State(state): State<Arc<AppState>>,
    Path((session_id, elicitation_id)): Path<(String, String)>,
    AppJson(reply): AppJson<ElicitReply>,
) -> Result<Json<serde_json::Value>, AppError> {
    let session = state.sessions.get(&session_id)?;
    session.respond(&elicitation_id, reply)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

fn elicitation_event(request: &ElicitationRequest) -> Event {
    let data = serde_json::to_string(request).unwrap_or_default();
    Event::default()
        .id(request.id.clone())
        .event("elicitation")
        .data(data)
}

// GET /sessions/:id/events: SSE stream of elicitation requests
pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state.sessions.get(&session_id)?;

    // Subscribe before reading the backlog so nothing falls between the two.
    let rx = session.subscribe();
    let backlog = session.pending();
    let seen: Vec<String> = backlog.iter().map(|r| r.id.clone()).collect();

    let catchup_stream = tokio_stream::iter(
        backlog
            .into_iter()
            .map(|request| Ok::<_, Infallible>(elicitation_event(&request))),
    );

    let live_stream = BroadcastStream::new(rx).filter_map(move |result| match result {
        Ok(request) if seen.contains(&request.id) => None,
        Ok(request) => Some(Ok(elicitation_event(&request))),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::warn!(skipped, "elicitation event stream lagged");
            None
        }
    });

    let keepalive_stream = IntervalStream::new(tokio::time::interval(Duration::from_secs(
        state.config.sse_keepalive_secs,
    )))
    .map(|_| Ok(Event::default().comment("keepalive")));

    let combined = catchup_stream.chain(live_stream);
    let merged = StreamExt::merge(combined, keepalive_stream);

    Ok(Sse::new(merged))
}
