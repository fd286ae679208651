use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Working state of one booking attempt. Lives only as long as the workflow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingDraft {
    pub date: String,
    pub party_size: i64,
}

impl BookingDraft {
    pub fn new(date: impl Into<String>, party_size: i64) -> Self {
        Self {
            date: date.into(),
            party_size,
        }
    }
}

/// Confirmation payload with every field defaulted.
///
/// A field that is missing or has the wrong type falls back to its default
/// instead of failing the whole record, so a malformed reply reads as
/// "not confirmed".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ConfirmationReply {
    #[serde(default, deserialize_with = "lenient")]
    pub confirm: bool,
    #[serde(default, deserialize_with = "lenient")]
    pub notes: String,
}

impl ConfirmationReply {
    pub fn from_payload(payload: Value) -> Self {
        serde_json::from_value(payload).unwrap_or_default()
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStage {
    Date,
    PartySize,
    Confirmation,
}

impl BookingStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStage::Date => "date",
            BookingStage::PartySize => "party_size",
            BookingStage::Confirmation => "confirmation",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BookingStage::Date => "date",
            BookingStage::PartySize => "party size",
            BookingStage::Confirmation => "confirmation",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    Declined,
    Cancelled,
    Disconnected,
    Failed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::Declined => "declined",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Disconnected => "disconnected",
            BookingStatus::Failed => "failed",
        }
    }
}

/// Terminal result of the booking workflow. `Display` renders the message
/// shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    Booked {
        date: String,
        party_size: i64,
        notes: String,
    },
    /// The actor answered the confirmation with `confirm = false`.
    Declined,
    /// The actor declined or cancelled one of the prompts.
    Cancelled(BookingStage),
    TooManyAttempts(BookingStage),
    Disconnected,
    Failed(String),
}

impl BookingOutcome {
    pub fn status(&self) -> BookingStatus {
        match self {
            BookingOutcome::Booked { .. } => BookingStatus::Booked,
            BookingOutcome::Declined => BookingStatus::Declined,
            BookingOutcome::Cancelled(_) | BookingOutcome::TooManyAttempts(_) => {
                BookingStatus::Cancelled
            }
            BookingOutcome::Disconnected => BookingStatus::Disconnected,
            BookingOutcome::Failed(_) => BookingStatus::Failed,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, BookingOutcome::Failed(_))
    }
}

impl fmt::Display for BookingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingOutcome::Booked {
                date,
                party_size,
                notes,
            } => {
                write!(
                    f,
                    "✅ Your table for {party_size} people on {date} has been booked."
                )?;
                if !notes.is_empty() {
                    write!(f, " Notes: {notes}")?;
                }
                Ok(())
            }
            BookingOutcome::Declined => write!(f, "❌ Booking cancelled."),
            BookingOutcome::Cancelled(BookingStage::Date) => {
                write!(f, "Date input cancelled. Booking cancelled.")
            }
            BookingOutcome::Cancelled(BookingStage::PartySize) => {
                write!(f, "Party size input cancelled. Booking cancelled.")
            }
            BookingOutcome::Cancelled(BookingStage::Confirmation) => {
                write!(f, "Booking confirmation cancelled.")
            }
            BookingOutcome::TooManyAttempts(stage) => {
                write!(
                    f,
                    "Too many invalid {} entries. Booking cancelled.",
                    stage.label()
                )
            }
            BookingOutcome::Disconnected => write!(f, "Client disconnected - booking cancelled."),
            BookingOutcome::Failed(detail) => {
                write!(f, "❌ Booking failed due to unexpected error: {detail}")
            }
        }
    }
}
