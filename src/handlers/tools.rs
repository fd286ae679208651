use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::AppError;
use crate::handlers::AppJson;
use crate::models::{BookingDraft, BookingOutcome, BookingStatus};
use crate::services::booking;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub tools: Vec<ToolDefinition>,
}

// GET /tools
pub async fn list_tools() -> Json<ToolsResponse> {
    Json(ToolsResponse {
        tools: vec![ToolDefinition {
            name: "book_table".to_string(),
            description: "Book a table, asking the client for any missing or invalid details"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Booking date (YYYY-MM-DD)",
                        "default": ""
                    },
                    "party_size": {
                        "type": "integer",
                        "description": "Number of people",
                        "default": 0
                    }
                }
            }),
        }],
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct BookTableArgs {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub party_size: i64,
}

#[derive(Debug, Serialize)]
pub struct TextContent {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ToolCallResponse {
    pub content: Vec<TextContent>,
    pub status: BookingStatus,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl From<BookingOutcome> for ToolCallResponse {
    fn from(outcome: BookingOutcome) -> Self {
        Self {
            status: outcome.status(),
            is_error: outcome.is_error(),
            content: vec![TextContent {
                kind: "text",
                text: outcome.to_string(),
            }],
        }
    }
}

// POST /sessions/:id/tools/book_table
pub async fn book_table(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(args): AppJson<BookTableArgs>,
) -> Result<Json<ToolCallResponse>, AppError> {
    let session = state.sessions.get(&session_id)?;
    tracing::info!(session = %session_id, "book_table called");

    let outcome = booking::book_table(
        session,
        &state.config,
        BookingDraft::new(args.date, args.party_size),
    )
    .await;

    Ok(Json(outcome.into()))
}
