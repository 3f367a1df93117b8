use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use shared::models::ShardKey;
use shared::validation::{validate_vote, ValidationError};
use tracing::{debug, warn};

use crate::store::{Claim, StoreError, VoteStore};

/// Outcome of a vote that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoteOutcome {
    Accepted { shard: ShardKey },
    /// Business rejection: terminal, never retried.
    AlreadyVoted,
    /// Storage failed or timed out. The transaction may or may not have
    /// applied; a retry resolves to `AlreadyVoted` if it did.
    TransientFailure(StoreError),
}

/// Checks-and-records the voter together with one shard increment.
///
/// The shard index is drawn uniformly at random so concurrent votes for a
/// popular candidate spread over `shard_count` counters. Uniqueness comes
/// from the ledger claim, not from the shard choice.
pub struct VoteCoordinator {
    store: Arc<dyn VoteStore>,
    shard_count: u32,
    store_timeout: Duration,
}

impl VoteCoordinator {
    pub fn new(store: Arc<dyn VoteStore>, shard_count: u32, store_timeout: Duration) -> Self {
        Self {
            store,
            shard_count: shard_count.max(1),
            store_timeout,
        }
    }

    fn pick_shard(&self, candidate_id: &str) -> ShardKey {
        let index = rand::thread_rng().gen_range(0..self.shard_count);
        ShardKey::new(candidate_id, index)
    }

    pub async fn submit_vote(&self, voter_id: &str, candidate_id: &str) -> Result<VoteOutcome, ValidationError> {
        let vote = validate_vote(voter_id, candidate_id)?;
        let shard = self.pick_shard(vote.candidate_id);

        let result = tokio::time::timeout(
            self.store_timeout,
            self.store.claim_and_increment(vote.voter_id, &shard),
        )
        .await
        .unwrap_or(Err(StoreError::Timeout));

        Ok(match result {
            Ok(Claim::Claimed) => {
                debug!("Vote accepted: {} -> {}", vote.voter_id, shard);
                VoteOutcome::Accepted { shard }
            }
            Ok(Claim::AlreadyClaimed) => {
                debug!("Duplicate vote ignored for voter {}", vote.voter_id);
                VoteOutcome::AlreadyVoted
            }
            Err(e) => {
                warn!("Vote for {} by {} not recorded: {}", vote.candidate_id, vote.voter_id, e);
                VoteOutcome::TransientFailure(e)
            }
        })
    }
}
