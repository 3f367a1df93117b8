use std::sync::Arc;

use futures::future::join_all;
use shared::models::{BatchItemFailure, BatchResponse, VoteRequest};
use shared::validation::validate_vote_request;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::coordinator::{VoteCoordinator, VoteOutcome};
use crate::queue::{IngestionQueue, QueueMessage};

/// What happened to one message of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    Accepted,
    Duplicate,
    /// Poison message: never redelivered.
    Dropped(String),
    Retry,
}

impl Disposition {
    pub fn needs_redelivery(&self) -> bool {
        matches!(self, Disposition::Retry)
    }
}

pub struct BatchConsumer {
    coordinator: Arc<VoteCoordinator>,
}

impl BatchConsumer {
    pub fn new(coordinator: Arc<VoteCoordinator>) -> Self {
        Self { coordinator }
    }

    pub async fn process_message(&self, message: &QueueMessage) -> Disposition {
        process_message(&self.coordinator, message).await
    }

    /// Processes every message independently and concurrently. Only messages
    /// that hit a transient failure, or whose task panicked, are reported.
    pub async fn process_batch(&self, batch: &[QueueMessage]) -> BatchResponse {
        let tasks = batch.iter().cloned().map(|message| {
            let coordinator = Arc::clone(&self.coordinator);
            tokio::spawn(async move { process_message(&coordinator, &message).await })
        });
        let results = join_all(tasks).await;

        let batch_item_failures = batch
            .iter()
            .zip(results)
            .filter_map(|(message, result)| {
                let retry = match result {
                    Ok(disposition) => disposition.needs_redelivery(),
                    Err(e) => {
                        error!("Worker task for message {} failed: {}", message.message_id, e);
                        true
                    }
                };
                retry.then(|| BatchItemFailure { item_identifier: message.message_id.to_string() })
            })
            .collect();

        BatchResponse { batch_item_failures }
    }

    /// Drains `queue` until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, queue: Arc<IngestionQueue>, batch_size: usize, mut shutdown: watch::Receiver<bool>) {
        info!("📥 Vote consumer started");
        loop {
            let batch = tokio::select! {
                batch = queue.receive(batch_size) => batch,
                _ = shutdown.changed() => break,
            };
            let batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    error!("Failed to receive from vote queue: {}", e);
                    break;
                }
            };

            let response = self.process_batch(&batch).await;
            match queue.complete(&batch, &response) {
                Ok(completion) => debug!(
                    "Batch of {} done: {} deleted, {} redelivered, {} dead-lettered",
                    batch.len(), completion.deleted, completion.redelivered, completion.dead_lettered
                ),
                Err(e) => error!("Failed to complete batch: {}", e),
            }

            if *shutdown.borrow() {
                break;
            }
        }
        info!("Vote consumer stopped");
    }
}

async fn process_message(coordinator: &VoteCoordinator, message: &QueueMessage) -> Disposition {
    let request: VoteRequest = match serde_json::from_str(&message.body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid message {}, unparsable body: {}", message.message_id, e);
            return Disposition::Dropped(e.to_string());
        }
    };

    let vote = match validate_vote_request(&request) {
        Ok(vote) => vote,
        Err(e) => {
            warn!("Invalid message {}: {}", message.message_id, e);
            return Disposition::Dropped(e.to_string());
        }
    };
    let user_id = vote.voter_id;

    match coordinator.submit_vote(vote.voter_id, vote.candidate_id).await {
        Err(e) => {
            warn!("Invalid message {}: {}", message.message_id, e);
            Disposition::Dropped(e.to_string())
        }
        Ok(VoteOutcome::Accepted { shard }) => {
            debug!("Successfully processed vote: {} -> {}", user_id, shard.candidate_id);
            Disposition::Accepted
        }
        Ok(VoteOutcome::AlreadyVoted) => {
            debug!("Duplicate vote ignored for user: {}", user_id);
            Disposition::Duplicate
        }
        Ok(VoteOutcome::TransientFailure(e)) => {
            warn!("System error for message {}: {}", message.message_id, e);
            Disposition::Retry
        }
    }
}
