use std::any::Any;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::errors::BookingError;
use crate::models::{
    BookingDraft, BookingOutcome, BookingStage, ConfirmationReply, FieldSchema,
};
use crate::models::elicitation::{MAX_PARTY_SIZE, MIN_PARTY_SIZE};
use crate::services::elicitation::{request_field, Elicitor};

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Parses `YYYY-MM-DD` and rejects anything before `today`.
pub fn validate_date(date: &str, today: NaiveDate) -> bool {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d >= today)
        .unwrap_or(false)
}

pub fn validate_party_size(party_size: i64) -> bool {
    (MIN_PARTY_SIZE..=MAX_PARTY_SIZE).contains(&party_size)
}

/// Accepts a JSON integer or a string of digits such as `"6"`.
pub fn parse_party_size(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Drives one booking attempt: date, then party size, then confirmation.
pub struct BookingWorkflow {
    elicitor: Arc<dyn Elicitor>,
    max_attempts: Option<u32>,
    today: Clock,
}

impl BookingWorkflow {
    pub fn new(elicitor: Arc<dyn Elicitor>) -> Self {
        Self {
            elicitor,
            max_attempts: None,
            today: Arc::new(|| Local::now().date_naive()),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_clock(mut self, today: impl Fn() -> NaiveDate + Send + Sync + 'static) -> Self {
        self.today = Arc::new(today);
        self
    }

    /// Runs the workflow to completion. Always yields an outcome: workflow
    /// errors and panics inside the workflow task become
    /// [`BookingOutcome::Disconnected`] or [`BookingOutcome::Failed`].
    pub async fn run(self, draft: BookingDraft) -> BookingOutcome {
        let mut task = AbortOnDrop(tokio::spawn(async move { self.drive(draft).await }));

        let outcome = match (&mut task.0).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "booking workflow aborted");
                e.into()
            }
            Err(e) if e.is_panic() => {
                let detail = panic_detail(e.into_panic());
                tracing::error!(error = %detail, "booking workflow panicked");
                BookingError::Internal(detail).into()
            }
            Err(e) => {
                tracing::error!(error = %e, "booking workflow task failed");
                BookingError::Internal(e.to_string()).into()
            }
        };

        tracing::info!(status = outcome.status().as_str(), "booking workflow finished");
        outcome
    }

    async fn drive(&self, mut draft: BookingDraft) -> Result<BookingOutcome, BookingError> {
        let mut attempts = 0;
        while !validate_date(&draft.date, (self.today)()) {
            if self.exhausted(attempts) {
                return Ok(BookingOutcome::TooManyAttempts(BookingStage::Date));
            }
            attempts += 1;

            let message = if draft.date.is_empty() {
                "Please enter the date for your booking:".to_string()
            } else {
                format!(
                    "Invalid date '{}'. Please enter a valid future date:",
                    draft.date
                )
            };

            let Some(value) = request_field(
                self.elicitor.as_ref(),
                &message,
                FieldSchema::Date,
                Some("date"),
            )
            .await
            else {
                return self.stopped(BookingStage::Date);
            };

            draft.date = match value {
                Value::String(date) => date,
                other => other.to_string(),
            };
        }

        let mut attempts = 0;
        while !validate_party_size(draft.party_size) {
            if self.exhausted(attempts) {
                return Ok(BookingOutcome::TooManyAttempts(BookingStage::PartySize));
            }
            attempts += 1;

            let message = if draft.party_size == 0 {
                "Please enter the party size for your booking:".to_string()
            } else {
                format!(
                    "Invalid party size '{}'. Please enter a valid number of people:",
                    draft.party_size
                )
            };

            let Some(value) = request_field(
                self.elicitor.as_ref(),
                &message,
                FieldSchema::PartySize,
                Some("party_size"),
            )
            .await
            else {
                return self.stopped(BookingStage::PartySize);
            };

            draft.party_size = parse_party_size(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "party size is not an integer");
                0
            });
        }

        let message = format!(
            "Please confirm your booking for {} people on {}.",
            draft.party_size, draft.date
        );
        let Some(payload) = request_field(
            self.elicitor.as_ref(),
            &message,
            FieldSchema::Confirmation,
            None,
        )
        .await
        else {
            return self.stopped(BookingStage::Confirmation);
        };

        let reply = ConfirmationReply::from_payload(payload);
        if reply.confirm {
            Ok(BookingOutcome::Booked {
                date: draft.date,
                party_size: draft.party_size,
                notes: reply.notes,
            })
        } else {
            Ok(BookingOutcome::Declined)
        }
    }

    fn exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// The gateway produced no value at `stage`.
    fn stopped(&self, stage: BookingStage) -> Result<BookingOutcome, BookingError> {
        if self.elicitor.is_closed() {
            Err(BookingError::Disconnected { stage })
        } else {
            Ok(BookingOutcome::Cancelled(stage))
        }
    }
}

/// Entry point of the `book_table` tool. Fields the caller already knows are
/// taken from `draft`; the rest are elicited.
pub async fn book_table(
    elicitor: Arc<dyn Elicitor>,
    config: &AppConfig,
    draft: BookingDraft,
) -> BookingOutcome {
    tracing::info!(
        date = %draft.date,
        party_size = draft.party_size,
        "booking workflow started"
    );
    BookingWorkflow::new(elicitor)
        .with_max_attempts(config.max_attempts)
        .run(draft)
        .await
}

struct AbortOnDrop<T>(JoinHandle<T>);

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn panic_detail(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "workflow panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ElicitError;
    use crate::models::{BookingStatus, ElicitOutcome};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Replays canned outcomes and records every prompt it was shown.
    struct Scripted {
        replies: Mutex<VecDeque<Result<ElicitOutcome<Value>, ElicitError>>>,
        prompts: Mutex<Vec<(FieldSchema, String)>>,
        closed: AtomicBool,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ElicitOutcome<Value>, ElicitError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(vec![]),
                closed: AtomicBool::new(false),
            })
        }

        fn accept(payload: Value) -> Result<ElicitOutcome<Value>, ElicitError> {
            Ok(ElicitOutcome::Accepted(payload))
        }

        fn prompts(&self) -> Vec<(FieldSchema, String)> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Elicitor for Scripted {
        async fn elicit(
            &self,
            message: &str,
            schema: FieldSchema,
        ) -> Result<ElicitOutcome<Value>, ElicitError> {
            self.prompts
                .lock()
                .unwrap()
                .push((schema, message.to_string()));
            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Err(ElicitError::Disconnected)) => {
                    self.closed.store(true, Ordering::SeqCst);
                    Err(ElicitError::Disconnected)
                }
                Some(reply) => reply,
                None => panic!("unexpected prompt: {message}"),
            }
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 6, 15).unwrap()
    }

    fn workflow(elicitor: &Arc<Scripted>) -> BookingWorkflow {
        BookingWorkflow::new(elicitor.clone()).with_clock(today)
    }

    #[test]
    fn test_validate_date() {
        assert!(validate_date("2030-06-15", today()));
        assert!(validate_date("2099-01-01", today()));
        assert!(!validate_date("2030-06-14", today()));
        assert!(!validate_date("13-2025-01", today()));
        assert!(!validate_date("2031-02-30", today()));
        assert!(!validate_date("", today()));
    }

    #[test]
    fn test_validate_party_size() {
        assert!(!validate_party_size(0));
        assert!(!validate_party_size(-3));
        assert!(!validate_party_size(21));
        assert!((1..=20).all(validate_party_size));
    }

    #[tokio::test]
    async fn test_presupplied_fields_skip_to_confirmation() {
        let elicitor = Scripted::new(vec![Scripted::accept(
            json!({"confirm": true, "notes": "window seat"}),
        )]);

        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 4))
            .await;

        let text = outcome.to_string();
        assert_eq!(outcome.status(), BookingStatus::Booked);
        assert!(text.contains('4'));
        assert!(text.contains("2099-01-01"));
        assert!(text.contains("window seat"));

        let prompts = elicitor.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].0, FieldSchema::Confirmation);
        assert_eq!(
            prompts[0].1,
            "Please confirm your booking for 4 people on 2099-01-01."
        );
    }

    #[tokio::test]
    async fn test_malformed_dates_reprompt() {
        let elicitor = Scripted::new(vec![
            Scripted::accept(json!({"date": "2024-02-30"})),
            Scripted::accept(json!({"date": "2099-01-01"})),
            Scripted::accept(json!({"confirm": true})),
        ]);

        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("13-2025-01", 2))
            .await;
        assert_eq!(outcome.status(), BookingStatus::Booked);

        let prompts = elicitor.prompts();
        assert_eq!(prompts.len(), 3);
        assert_eq!(
            prompts[0].1,
            "Invalid date '13-2025-01'. Please enter a valid future date:"
        );
        assert_eq!(
            prompts[1].1,
            "Invalid date '2024-02-30'. Please enter a valid future date:"
        );
        assert_eq!(prompts[2].0, FieldSchema::Confirmation);
    }

    #[tokio::test]
    async fn test_past_date_named_in_reprompt() {
        let elicitor = Scripted::new(vec![
            Scripted::accept(json!({"date": "2030-06-14"})),
            Scripted::accept(json!({"date": "2030-06-15"})),
            Scripted::accept(json!({"confirm": true})),
        ]);

        let outcome = workflow(&elicitor).run(BookingDraft::new("", 3)).await;

        assert_eq!(outcome.status(), BookingStatus::Booked);
        let prompts = elicitor.prompts();
        assert_eq!(prompts[0].1, "Please enter the date for your booking:");
        assert!(prompts[1].1.contains("'2030-06-14'"));
        assert!(outcome.to_string().contains("2030-06-15"));
    }

    #[tokio::test]
    async fn test_invalid_party_size_reprompts() {
        let elicitor = Scripted::new(vec![
            Scripted::accept(json!({"party_size": "many"})),
            Scripted::accept(json!({"party_size": 6})),
            Scripted::accept(json!({"confirm": true})),
        ]);

        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", -2))
            .await;

        assert_eq!(outcome.status(), BookingStatus::Booked);
        let prompts = elicitor.prompts();
        assert_eq!(
            prompts[0].1,
            "Invalid party size '-2'. Please enter a valid number of people:"
        );
        assert_eq!(prompts[1].1, "Please enter the party size for your booking:");
        assert!(outcome.to_string().contains("6 people"));
    }

    #[tokio::test]
    async fn test_numeric_string_party_size_is_accepted() {
        let elicitor = Scripted::new(vec![
            Scripted::accept(json!({"party_size": "6"})),
            Scripted::accept(json!({"confirm": true})),
        ]);

        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 0))
            .await;

        assert_eq!(outcome.status(), BookingStatus::Booked);
        let prompts = elicitor.prompts();
        assert_eq!(prompts.len(), 2);
        assert_eq!(
            prompts[1].1,
            "Please confirm your booking for 6 people on 2099-01-01."
        );
    }

    #[test]
    fn test_parse_party_size() {
        assert_eq!(parse_party_size(&json!(4)), Some(4));
        assert_eq!(parse_party_size(&json!("6")), Some(6));
        assert_eq!(parse_party_size(&json!(" 12 ")), Some(12));
        assert_eq!(parse_party_size(&json!("many")), None);
        assert_eq!(parse_party_size(&json!(2.5)), None);
    }

    #[tokio::test]
    async fn test_cancel_at_each_stage_stops() {
        let elicitor = Scripted::new(vec![Ok(ElicitOutcome::Declined)]);
        let outcome = workflow(&elicitor).run(BookingDraft::default()).await;
        assert_eq!(outcome, BookingOutcome::Cancelled(BookingStage::Date));
        assert_eq!(outcome.to_string(), "Date input cancelled. Booking cancelled.");
        assert_eq!(elicitor.prompts().len(), 1);

        let elicitor = Scripted::new(vec![Ok(ElicitOutcome::Cancelled)]);
        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 0))
            .await;
        assert_eq!(
            outcome.to_string(),
            "Party size input cancelled. Booking cancelled."
        );
        assert_eq!(elicitor.prompts().len(), 1);

        let elicitor = Scripted::new(vec![Ok(ElicitOutcome::Declined)]);
        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 4))
            .await;
        assert_eq!(outcome.to_string(), "Booking confirmation cancelled.");
    }

    #[tokio::test]
    async fn test_accepted_without_field_cancels() {
        let elicitor = Scripted::new(vec![Scripted::accept(json!({"day": "monday"}))]);
        let outcome = workflow(&elicitor).run(BookingDraft::default()).await;
        assert_eq!(outcome, BookingOutcome::Cancelled(BookingStage::Date));
    }

    #[tokio::test]
    async fn test_not_confirmed_regardless_of_notes() {
        let elicitor = Scripted::new(vec![Scripted::accept(
            json!({"confirm": false, "notes": "please hold it"}),
        )]);
        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 4))
            .await;
        assert_eq!(outcome, BookingOutcome::Declined);
        assert_eq!(outcome.to_string(), "❌ Booking cancelled.");
    }

    #[tokio::test]
    async fn test_confirmation_without_notes() {
        let elicitor = Scripted::new(vec![Scripted::accept(json!({"confirm": true}))]);
        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 4))
            .await;
        assert_eq!(
            outcome.to_string(),
            "✅ Your table for 4 people on 2099-01-01 has been booked."
        );
    }

    #[tokio::test]
    async fn test_malformed_confirmation_is_not_confirmed() {
        let elicitor = Scripted::new(vec![Scripted::accept(json!("yes please"))]);
        let outcome = workflow(&elicitor)
            .run(BookingDraft::new("2099-01-01", 4))
            .await;
        assert_eq!(outcome, BookingOutcome::Declined);
    }

    #[tokio::test]
    async fn test_disconnect_reported_distinctly() {
        let elicitor = Scripted::new(vec![
            Scripted::accept(json!({"date": "2099-01-01"})),
            Err(ElicitError::Disconnected),
        ]);
        let outcome = workflow(&elicitor).run(BookingDraft::default()).await;
        assert_eq!(outcome, BookingOutcome::Disconnected);
        assert_eq!(
            outcome.to_string(),
            "Client disconnected - booking cancelled."
        );
    }

    #[tokio::test]
    async fn test_attempt_cap() {
        let elicitor = Scripted::new(vec![
            Scripted::accept(json!({"date": "nope"})),
            Scripted::accept(json!({"date": "2000-01-01"})),
        ]);
        let outcome = workflow(&elicitor)
            .with_max_attempts(Some(2))
            .run(BookingDraft::default())
            .await;
        assert_eq!(outcome, BookingOutcome::TooManyAttempts(BookingStage::Date));
        assert_eq!(
            outcome.to_string(),
            "Too many invalid date entries. Booking cancelled."
        );
        assert_eq!(elicitor.prompts().len(), 2);
    }

    #[tokio::test]
    async fn test_panic_becomes_failure() {
        // An empty script panics on the first prompt.
        let elicitor = Scripted::new(vec![]);
        let outcome = workflow(&elicitor).run(BookingDraft::default()).await;
        assert_eq!(outcome.status(), BookingStatus::Failed);
        assert!(outcome
            .to_string()
            .starts_with("❌ Booking failed due to unexpected error: unexpected prompt"));
    }
}
