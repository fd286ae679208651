use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ElicitError;
use crate::models::{ElicitOutcome, FieldSchema};

/// The one capability the booking workflow uses to talk to the remote actor.
#[async_trait]
pub trait Elicitor: Send + Sync {
    async fn elicit(
        &self,
        message: &str,
        schema: FieldSchema,
    ) -> Result<ElicitOutcome<Value>, ElicitError>;

    /// Whether the underlying session is gone. Lets callers tell a dead
    /// connection apart from an actor that merely declined.
    fn is_closed(&self) -> bool {
        false
    }
}

/// One elicitation round trip, collapsed to "value or nothing".
///
/// With `extract` set, only that top-level field of the accepted payload is
/// returned; a missing or null field yields `None`. Decline, cancel, and every
/// transport failure also yield `None`. No retries happen here.
pub async fn request_field(
    elicitor: &dyn Elicitor,
    message: &str,
    schema: FieldSchema,
    extract: Option<&str>,
) -> Option<Value> {
    let outcome = match elicitor.elicit(message, schema).await {
        Ok(outcome) => outcome,
        Err(ElicitError::Disconnected) => {
            tracing::warn!(field = schema.as_str(), "client disconnected during elicitation");
            return None;
        }
        Err(e) => {
            tracing::warn!(field = schema.as_str(), error = %e, "elicitation failed");
            return None;
        }
    };

    match outcome {
        ElicitOutcome::Accepted(payload) => {
            tracing::debug!(field = schema.as_str(), payload = %payload, "elicitation accepted");
            match extract {
                None => Some(payload),
                Some(name) => payload.get(name).filter(|v| !v.is_null()).cloned(),
            }
        }
        ElicitOutcome::Declined => {
            tracing::info!(field = schema.as_str(), "elicitation declined");
            None
        }
        ElicitOutcome::Cancelled => {
            tracing::info!(field = schema.as_str(), "elicitation cancelled");
            None
        }
    }
}
