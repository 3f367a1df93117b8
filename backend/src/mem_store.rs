use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use futures::stream::{self, BoxStream, StreamExt};
use shared::models::*;
use time::OffsetDateTime;

use crate::store::*;

#[derive(Debug, Default)]
struct Votes {
    voters: HashSet<String>,
    shards: BTreeMap<ShardKey, u64>,
}

/// In-memory backend for tests and local runs. Not persisted across restarts.
///
/// Ledger and shards share one lock, which makes `claim_and_increment`
/// trivially all-or-nothing.
#[derive(Debug, Default)]
pub struct MemStore {
    votes: Mutex<Votes>,
    candidates: Mutex<HashMap<String, Candidate>>,
    snapshots: Mutex<HashMap<String, SnapshotObject>>,
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, StoreError> {
    mutex
        .lock()
        .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voter_count(&self) -> Result<usize, StoreError> {
        Ok(lock(&self.votes)?.voters.len())
    }

    pub fn has_voted(&self, voter_id: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.votes)?.voters.contains(voter_id))
    }

    /// Non-zero shards of one candidate, keyed by shard index.
    pub fn shards_of(&self, candidate_id: &str) -> Result<BTreeMap<u32, u64>, StoreError> {
        Ok(lock(&self.votes)?
            .shards
            .iter()
            .filter(|(key, _)| key.candidate_id == candidate_id)
            .map(|(key, votes)| (key.shard_index, *votes))
            .collect())
    }
}

#[rocket::async_trait]
impl CounterStore for MemStore {
    async fn increment(&self, key: &ShardKey, by: u64) -> Result<(), StoreError> {
        let mut votes = lock(&self.votes)?;
        let count = votes.shards.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(by);
        Ok(())
    }

    async fn read_shard(&self, key: &ShardKey) -> Result<u64, StoreError> {
        Ok(lock(&self.votes)?.shards.get(key).copied().unwrap_or(0))
    }

    fn scan_all(&self) -> BoxStream<'_, Result<ShardRecord, StoreError>> {
        let rows: Vec<Result<ShardRecord, StoreError>> = match lock(&self.votes) {
            Ok(votes) => votes
                .shards
                .iter()
                .map(|(key, count)| Ok(ShardRecord::new(key, *count)))
                .collect(),
            Err(e) => vec![Err(e)],
        };
        stream::iter(rows).boxed()
    }
}

#[rocket::async_trait]
impl IdempotencyLedger for MemStore {
    async fn try_claim(&self, voter_id: &str) -> Result<Claim, StoreError> {
        if lock(&self.votes)?.voters.insert(voter_id.to_string()) {
            Ok(Claim::Claimed)
        } else {
            Ok(Claim::AlreadyClaimed)
        }
    }
}

#[rocket::async_trait]
impl VoteStore for MemStore {
    async fn claim_and_increment(&self, voter_id: &str, key: &ShardKey) -> Result<Claim, StoreError> {
        let mut votes = lock(&self.votes)?;
        if !votes.voters.insert(voter_id.to_string()) {
            return Ok(Claim::AlreadyClaimed);
        }
        let count = votes.shards.entry(key.clone()).or_insert(0);
        *count = count.saturating_add(1);
        Ok(Claim::Claimed)
    }
}

#[rocket::async_trait]
impl CandidateRepository for MemStore {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        Ok(lock(&self.candidates)?.values().cloned().collect())
    }

    async fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>, StoreError> {
        Ok(lock(&self.candidates)?.get(candidate_id).cloned())
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError> {
        lock(&self.candidates)?.insert(candidate.candidate_id.clone(), candidate.clone());
        Ok(())
    }

    async fn update_candidate(
        &self,
        candidate_id: &str,
        update: &CandidateUpdate,
        updated_at: OffsetDateTime,
    ) -> Result<Option<Candidate>, StoreError> {
        let mut candidates = lock(&self.candidates)?;
        Ok(candidates.get_mut(candidate_id).map(|candidate| {
            update.apply(candidate);
            candidate.updated_at = Some(updated_at);
            candidate.clone()
        }))
    }

    async fn delete_candidate(&self, candidate_id: &str) -> Result<bool, StoreError> {
        Ok(lock(&self.candidates)?.remove(candidate_id).is_some())
    }
}

#[rocket::async_trait]
impl SnapshotStore for MemStore {
    async fn publish(&self, object: SnapshotObject) -> Result<(), StoreError> {
        let mut snapshots = lock(&self.snapshots)?;
        // An older generation never replaces a newer one.
        if snapshots.get(&object.key).is_some_and(|current| current.generated_at > object.generated_at) {
            return Ok(());
        }
        snapshots.insert(object.key.clone(), object);
        Ok(())
    }

    async fn fetch_latest(&self, key: &str) -> Result<Option<SnapshotObject>, StoreError> {
        Ok(lock(&self.snapshots)?.get(key).cloned())
    }
}
