use futures::stream::BoxStream;
use shared::models::*;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
    #[error("Storage call timed out")]
    Timeout,
    #[error("Storage error: {0}")]
    Backend(String),
    #[error("Corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Result of trying to record a voter in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Claim {
    Claimed,
    AlreadyClaimed,
}

/// Horizontally partitioned vote counters.
///
/// `increment` must be atomic per key at the storage layer. `scan_all` is
/// expensive and reserved for the snapshot builder.
#[rocket::async_trait]
pub trait CounterStore: Send + Sync {
    async fn increment(&self, key: &ShardKey, by: u64) -> Result<(), StoreError>;

    /// Count of a single shard; 0 when the shard was never written.
    async fn read_shard(&self, key: &ShardKey) -> Result<u64, StoreError>;

    fn scan_all(&self) -> BoxStream<'_, Result<ShardRecord, StoreError>>;
}

/// Durable set of voters that have already voted.
#[rocket::async_trait]
pub trait IdempotencyLedger: Send + Sync {
    async fn try_claim(&self, voter_id: &str) -> Result<Claim, StoreError>;
}

#[rocket::async_trait]
pub trait VoteStore: CounterStore + IdempotencyLedger {
    /// Claims `voter_id` and increments `key` by one in a single all-or-nothing
    /// transaction. `AlreadyClaimed` leaves every shard untouched.
    async fn claim_and_increment(&self, voter_id: &str, key: &ShardKey) -> Result<Claim, StoreError>;
}

#[rocket::async_trait]
pub trait CandidateRepository: Send + Sync {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError>;

    async fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>, StoreError>;

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError>;

    /// Returns the updated record, or `None` when the candidate does not exist.
    async fn update_candidate(
        &self,
        candidate_id: &str,
        update: &CandidateUpdate,
        updated_at: OffsetDateTime,
    ) -> Result<Option<Candidate>, StoreError>;

    /// Returns whether a record was removed.
    async fn delete_candidate(&self, candidate_id: &str) -> Result<bool, StoreError>;
}

/// A serialized snapshot as stored in the distribution tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotObject {
    pub key: String,
    pub body: String,
    pub content_type: String,
    pub cache_control: String,
    pub generated_at: OffsetDateTime,
}

/// Object store holding published snapshots. `publish` replaces the object
/// under its key in one step; readers never see a partial body.
#[rocket::async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn publish(&self, object: SnapshotObject) -> Result<(), StoreError>;

    async fn fetch_latest(&self, key: &str) -> Result<Option<SnapshotObject>, StoreError>;
}
