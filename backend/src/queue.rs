use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use shared::models::{BatchResponse, VoteRequest};
use time::OffsetDateTime;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;

const RECLAIM_POLL: Duration = Duration::from_millis(500);

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is full ({0} messages)")]
    Full(usize),
    #[error("Failed to encode message: {0}")]
    Encode(String),
    #[error("Queue lock poisoned")]
    LockPoisoned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: Uuid,
    pub body: String,
    /// Number of times this message has been handed to a consumer.
    pub receive_count: u32,
    pub sent_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy)]
pub struct QueueSettings {
    pub capacity: usize,
    pub visibility_timeout: Duration,
    pub max_receive_count: u32,
}

impl From<&Config> for QueueSettings {
    fn from(config: &Config) -> Self {
        Self {
            capacity: config.queue_capacity,
            visibility_timeout: config.visibility_timeout,
            max_receive_count: config.max_receive_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Completion {
    pub deleted: usize,
    pub redelivered: usize,
    pub dead_lettered: usize,
}

#[derive(Debug)]
struct InFlight {
    message: QueueMessage,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    in_flight: HashMap<Uuid, InFlight>,
    dead_letters: Vec<QueueMessage>,
}

/// In-process at-least-once queue sitting between vote submission and the
/// batch consumers.
///
/// A received message stays invisible until it is completed or its
/// visibility timeout lapses, after which it is handed out again. Messages
/// that keep failing move to the dead-letter list once they have been
/// received `max_receive_count` times.
#[derive(Debug)]
pub struct IngestionQueue {
    state: Mutex<QueueState>,
    available: Notify,
    settings: QueueSettings,
}

impl IngestionQueue {
    pub fn new(settings: QueueSettings) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            settings,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueState>, QueueError> {
        self.state.lock().map_err(|_| QueueError::LockPoisoned)
    }

    pub fn send(&self, body: impl Into<String>) -> Result<Uuid, QueueError> {
        let mut state = self.lock()?;
        let size = state.ready.len() + state.in_flight.len();
        if size >= self.settings.capacity {
            return Err(QueueError::Full(size));
        }
        let message = QueueMessage {
            message_id: Uuid::new_v4(),
            body: body.into(),
            receive_count: 0,
            sent_at: OffsetDateTime::now_utc(),
        };
        let id = message.message_id;
        state.ready.push_back(message);
        drop(state);

        self.available.notify_one();
        Ok(id)
    }

    pub fn send_vote(&self, request: &VoteRequest) -> Result<Uuid, QueueError> {
        let body = serde_json::to_string(request).map_err(|e| QueueError::Encode(e.to_string()))?;
        self.send(body)
    }

    fn retire(&self, state: &mut QueueState, message: QueueMessage) -> bool {
        if message.receive_count >= self.settings.max_receive_count {
            warn!("Message {} moved to dead letters after {} receives", message.message_id, message.receive_count);
            state.dead_letters.push(message);
            true
        } else {
            state.ready.push_back(message);
            false
        }
    }

    fn reclaim_expired(&self, state: &mut QueueState, now: Instant) {
        let expired: Vec<Uuid> = state
            .in_flight
            .iter()
            .filter(|(_, entry)| entry.visible_at <= now)
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(entry) = state.in_flight.remove(&id) {
                debug!("Visibility timeout lapsed for message {}", id);
                self.retire(state, entry.message);
            }
        }
    }

    /// Hands out up to `max` visible messages without waiting.
    pub fn try_receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        let now = Instant::now();
        let mut state = self.lock()?;
        self.reclaim_expired(&mut state, now);

        let take = max.min(state.ready.len());
        let drained: Vec<QueueMessage> = state.ready.drain(..take).collect();
        let mut batch = Vec::with_capacity(take);
        for mut message in drained {
            message.receive_count += 1;
            state.in_flight.insert(message.message_id, InFlight {
                message: message.clone(),
                visible_at: now + self.settings.visibility_timeout,
            });
            batch.push(message);
        }
        Ok(batch)
    }

    /// Waits until at least one message is visible, then returns up to `max`.
    pub async fn receive(&self, max: usize) -> Result<Vec<QueueMessage>, QueueError> {
        loop {
            let batch = self.try_receive(max)?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            // Bounded wait so in-flight messages whose timeout lapses are
            // picked up even without a new send.
            let _ = tokio::time::timeout(RECLAIM_POLL, self.available.notified()).await;
        }
    }

    /// Deletes every message of `batch` not listed in `response` and makes the
    /// listed ones visible again. Completions for messages whose visibility
    /// already lapsed are ignored; the redelivered copy is authoritative.
    pub fn complete(&self, batch: &[QueueMessage], response: &BatchResponse) -> Result<Completion, QueueError> {
        let failed: HashSet<&str> = response.failed_ids().collect();
        let mut completion = Completion::default();
        let mut state = self.lock()?;

        for message in batch {
            let Some(entry) = state.in_flight.remove(&message.message_id) else {
                debug!("Ignoring stale completion for message {}", message.message_id);
                continue;
            };
            if failed.contains(message.message_id.to_string().as_str()) {
                if self.retire(&mut state, entry.message) {
                    completion.dead_lettered += 1;
                } else {
                    completion.redelivered += 1;
                }
            } else {
                completion.deleted += 1;
            }
        }
        drop(state);

        if completion.redelivered > 0 {
            self.available.notify_waiters();
        }
        Ok(completion)
    }

    pub fn depth(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.ready.len())
    }

    pub fn in_flight(&self) -> Result<usize, QueueError> {
        Ok(self.lock()?.in_flight.len())
    }

    pub fn dead_letters(&self) -> Result<Vec<QueueMessage>, QueueError> {
        Ok(self.lock()?.dead_letters.clone())
    }
}
