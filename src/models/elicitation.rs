use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub const MIN_PARTY_SIZE: i64 = 1;
pub const MAX_PARTY_SIZE: i64 = 20;

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is a valid regex")
});

/// The fixed set of values the booking workflow can ask the remote actor for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldSchema {
    Date,
    PartySize,
    Confirmation,
}

impl FieldSchema {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldSchema::Date => "date",
            FieldSchema::PartySize => "party_size",
            FieldSchema::Confirmation => "confirmation",
        }
    }

    /// Flat object schema sent alongside the prompt as `requestedSchema`.
    pub fn requested_schema(&self) -> Value {
        match self {
            FieldSchema::Date => json!({
                "type": "object",
                "properties": {
                    "date": {
                        "type": "string",
                        "description": "Enter the date for your booking (YYYY-MM-DD)",
                        "pattern": DATE_PATTERN.as_str(),
                    }
                },
                "required": ["date"]
            }),
            FieldSchema::PartySize => json!({
                "type": "object",
                "properties": {
                    "party_size": {
                        "type": "integer",
                        "description": "Enter the number of people for your booking",
                        "minimum": MIN_PARTY_SIZE,
                        "maximum": MAX_PARTY_SIZE,
                    }
                },
                "required": ["party_size"]
            }),
            FieldSchema::Confirmation => json!({
                "type": "object",
                "properties": {
                    "confirm": {
                        "type": "boolean",
                        "description": "Confirm the booking",
                    },
                    "notes": {
                        "type": "string",
                        "description": "Special requests or notes",
                        "default": "",
                    }
                },
                "required": ["confirm"]
            }),
        }
    }

    /// Structural check of an accepted payload against this schema.
    ///
    /// Only shape and declared bounds are checked here. Whether a date lies in
    /// the past is a workflow concern.
    pub fn check(&self, payload: &Value) -> Result<(), SchemaViolation> {
        let object = payload
            .as_object()
            .ok_or_else(|| SchemaViolation::new(self.as_str(), "expected an object"))?;

        match self {
            FieldSchema::Date => {
                let date = object
                    .get("date")
                    .and_then(Value::as_str)
                    .ok_or_else(|| SchemaViolation::new("date", "expected a string"))?;
                if !DATE_PATTERN.is_match(date) {
                    return Err(SchemaViolation::new("date", "expected YYYY-MM-DD"));
                }
            }
            FieldSchema::PartySize => {
                let size = object
                    .get("party_size")
                    .and_then(Value::as_i64)
                    .ok_or_else(|| SchemaViolation::new("party_size", "expected an integer"))?;
                if !(MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&size) {
                    return Err(SchemaViolation::new(
                        "party_size",
                        format!("must be between {MIN_PARTY_SIZE} and {MAX_PARTY_SIZE}"),
                    ));
                }
            }
            FieldSchema::Confirmation => {
                if !object.get("confirm").is_some_and(Value::is_boolean) {
                    return Err(SchemaViolation::new("confirm", "expected a boolean"));
                }
                if let Some(notes) = object.get("notes") {
                    if !notes.is_string() && !notes.is_null() {
                        return Err(SchemaViolation::new("notes", "expected a string"));
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid '{field}': {reason}")]
pub struct SchemaViolation {
    pub field: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(field: &str, reason: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Disposition of one elicitation round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum ElicitOutcome<T> {
    Accepted(T),
    Declined,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// Reply body posted by the remote actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitReply {
    pub action: ElicitAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
}

impl From<ElicitReply> for ElicitOutcome<Value> {
    fn from(reply: ElicitReply) -> Self {
        match reply.action {
            ElicitAction::Accept => ElicitOutcome::Accepted(reply.content.unwrap_or(Value::Null)),
            ElicitAction::Decline => ElicitOutcome::Declined,
            ElicitAction::Cancel => ElicitOutcome::Cancelled,
        }
    }
}

/// A prompt published to the remote actor, awaiting a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationRequest {
    pub id: String,
    pub field: FieldSchema,
    pub message: String,
    #[serde(rename = "requestedSchema")]
    pub requested_schema: Value,
}

impl ElicitationRequest {
    pub fn new(message: &str, schema: FieldSchema) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            field: schema,
            message: message.to_string(),
            requested_schema: schema.requested_schema(),
        }
    }
}
