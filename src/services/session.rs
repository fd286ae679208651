use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::errors::{AppError, ElicitError};
use crate::models::{ElicitOutcome, ElicitReply, ElicitationRequest, FieldSchema};
use crate::services::elicitation::Elicitor;

// Abandoned elicitation ids remembered so late replies get 410 rather than 404.
const ABANDONED_CAPACITY: usize = 32;

struct PendingElicitation {
    request: ElicitationRequest,
    reply_tx: oneshot::Sender<ElicitOutcome<Value>>,
}

struct SessionInner {
    pending: HashMap<String, PendingElicitation>,
    // Insertion order, so catch-up replays prompts in the order they were asked.
    order: Vec<String>,
    abandoned: VecDeque<String>,
    closed: bool,
    last_active: Instant,
}

impl Default for SessionInner {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            order: Vec::new(),
            abandoned: VecDeque::new(),
            closed: false,
            last_active: Instant::now(),
        }
    }
}

impl SessionInner {
    fn abandon(&mut self, id: &str) {
        if self.take(id).is_none() {
            return;
        }
        if self.abandoned.len() == ABANDONED_CAPACITY {
            self.abandoned.pop_front();
        }
        self.abandoned.push_back(id.to_string());
    }

    fn take(&mut self, id: &str) -> Option<PendingElicitation> {
        self.order.retain(|pending_id| pending_id != id);
        self.pending.remove(id)
    }
}

/// Transport-side channel to one remote actor.
///
/// Each elicitation is parked as pending, published on the session's event
/// stream, and resolved when the actor posts a reply. Closing the session
/// drops every pending reply channel, which the waiting workflow observes as
/// a disconnect.
pub struct Session {
    id: String,
    inner: Mutex<SessionInner>,
    events_tx: broadcast::Sender<ElicitationRequest>,
}

impl Session {
    pub fn new(id: impl Into<String>, event_buffer: usize) -> Self {
        let (events_tx, _) = broadcast::channel(event_buffer.max(1));
        Self {
            id: id.into(),
            inner: Mutex::new(SessionInner::default()),
            events_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(&self) {
        self.lock().last_active = Instant::now();
    }

    /// Idle when nothing is pending and nothing happened for `max_idle`.
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        let inner = self.lock();
        inner.pending.is_empty() && inner.last_active.elapsed() >= max_idle
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ElicitationRequest> {
        self.events_tx.subscribe()
    }

    /// Elicitations still waiting for a reply, oldest first.
    pub fn pending(&self) -> Vec<ElicitationRequest> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.pending.get(id))
            .map(|p| p.request.clone())
            .collect()
    }

    /// Resolves a pending elicitation with the actor's reply.
    ///
    /// An accepted payload must pass the schema's structural check; if it
    /// does not, the elicitation stays pending so the actor can answer again.
    pub fn respond(&self, elicitation_id: &str, reply: ElicitReply) -> Result<(), AppError> {
        let mut inner = self.lock();
        inner.last_active = Instant::now();

        if inner.abandoned.iter().any(|id| id == elicitation_id) {
            return Err(AppError::Gone(format!(
                "elicitation {elicitation_id} is no longer awaited"
            )));
        }

        let pending = inner
            .pending
            .get(elicitation_id)
            .ok_or_else(|| AppError::NotFound(format!("elicitation {elicitation_id}")))?;

        let outcome = ElicitOutcome::from(reply);
        if let ElicitOutcome::Accepted(payload) = &outcome {
            if let Err(violation) = pending.request.field.check(payload) {
                tracing::info!(
                    session = %self.id,
                    elicitation = elicitation_id,
                    error = %violation,
                    "rejected elicitation reply"
                );
                return Err(violation.into());
            }
        }

        let Some(pending) = inner.take(elicitation_id) else {
            return Err(AppError::NotFound(format!("elicitation {elicitation_id}")));
        };
        drop(inner);

        pending.reply_tx.send(outcome).map_err(|_| {
            AppError::Gone(format!("elicitation {elicitation_id} is no longer awaited"))
        })?;

        tracing::info!(session = %self.id, elicitation = elicitation_id, "elicitation resolved");
        Ok(())
    }

    /// Marks the session closed and fails every pending elicitation.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        let dropped = inner.pending.len();
        inner.pending.clear();
        inner.order.clear();
        tracing::info!(session = %self.id, dropped, "session closed");
    }
}

/// Removes a pending entry whose waiter went away before a reply arrived.
struct PendingGuard<'a> {
    session: &'a Session,
    id: String,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.session.lock().abandon(&self.id);
    }
}

#[async_trait]
impl Elicitor for Session {
    async fn elicit(
        &self,
        message: &str,
        schema: FieldSchema,
    ) -> Result<ElicitOutcome<Value>, ElicitError> {
        let request = ElicitationRequest::new(message, schema);
        let (reply_tx, reply_rx) = oneshot::channel();

        {
            let mut inner = self.lock();
            if inner.closed {
                return Err(ElicitError::Closed);
            }
            inner.last_active = Instant::now();
            inner.order.push(request.id.clone());
            inner.pending.insert(
                request.id.clone(),
                PendingElicitation {
                    request: request.clone(),
                    reply_tx,
                },
            );
        }

        let _guard = PendingGuard {
            session: self,
            id: request.id.clone(),
        };

        tracing::info!(
            session = %self.id,
            elicitation = %request.id,
            field = schema.as_str(),
            "elicitation requested"
        );
        // No subscribers is fine: the request stays listed as pending.
        let _ = self.events_tx.send(request);

        reply_rx.await.map_err(|_| ElicitError::Disconnected)
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Live sessions keyed by id.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, event_buffer: usize) -> Arc<Session> {
        let session = Arc::new(Session::new(uuid::Uuid::new_v4().to_string(), event_buffer));
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id().to_string(), session.clone());
        tracing::info!(session = %session.id(), "session opened");
        session
    }

    pub fn get(&self, id: &str) -> Result<Arc<Session>, AppError> {
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("session {id}")))?;
        session.touch();
        Ok(session)
    }

    /// Closes and removes sessions idle for at least `max_idle`. Returns how
    /// many were evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let evicted: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
            let idle: Vec<String> = sessions
                .iter()
                .filter(|(_, session)| session.is_idle(max_idle))
                .map(|(id, _)| id.clone())
                .collect();
            idle.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        for session in &evicted {
            session.close();
        }
        if !evicted.is_empty() {
            tracing::info!(evicted = evicted.len(), "evicted idle sessions");
        }
        evicted.len()
    }

    /// Removes and closes a session.
    pub fn close(&self, id: &str) -> Result<(), AppError> {
        let session = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .ok_or_else(|| AppError::NotFound(format!("session {id}")))?;
        session.close();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
