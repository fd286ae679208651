pub mod booking;
pub mod elicitation;

pub use booking::{BookingDraft, BookingOutcome, BookingStage, BookingStatus, ConfirmationReply};
pub use elicitation::{
    ElicitAction, ElicitOutcome, ElicitReply, ElicitationRequest, FieldSchema, SchemaViolation,
};
