use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::TryStreamExt;
use shared::models::AggregationSnapshot;
use shared::tally::Tally;
use time::OffsetDateTime;
use tokio::sync::{watch, Notify};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::store::{CandidateRepository, CounterStore, SnapshotObject, SnapshotStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("Failed to scan candidates: {0}")]
    Candidates(StoreError),
    #[error("Failed to scan vote shards: {0}")]
    Shards(StoreError),
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Failed to publish snapshot: {0}")]
    Publish(StoreError),
}

/// Periodically rolls all shards up per candidate and publishes the result
/// as one immutable object.
pub struct SnapshotBuilder {
    candidates: Arc<dyn CandidateRepository>,
    counters: Arc<dyn CounterStore>,
    publisher: Arc<dyn SnapshotStore>,
    key: String,
    cache_control: String,
    rebuild: Notify,
}

impl SnapshotBuilder {
    pub fn new(
        candidates: Arc<dyn CandidateRepository>,
        counters: Arc<dyn CounterStore>,
        publisher: Arc<dyn SnapshotStore>,
        key: impl Into<String>,
        max_age: Duration,
    ) -> Self {
        Self {
            candidates,
            counters,
            publisher,
            key: key.into(),
            cache_control: format!("public, max-age={}", max_age.as_secs()),
            rebuild: Notify::new(),
        }
    }

    pub async fn build_snapshot(&self) -> Result<AggregationSnapshot, SnapshotError> {
        let candidates = self.candidates.list_candidates().await.map_err(SnapshotError::Candidates)?;

        let mut tally = Tally::new();
        let mut shards = self.counters.scan_all();
        while let Some(shard) = shards.try_next().await.map_err(SnapshotError::Shards)? {
            tally.record(&shard);
        }
        let shard_count = tally.shards_seen();

        let (snapshot, orphans) = tally.into_snapshot(candidates, OffsetDateTime::now_utc());
        if orphans.candidates > 0 {
            debug!(
                "Skipped {} votes on {} deleted candidates ({} shards scanned)",
                orphans.votes, orphans.candidates, shard_count
            );
        }
        Ok(snapshot)
    }

    pub async fn publish(&self, snapshot: &AggregationSnapshot) -> Result<(), SnapshotError> {
        let object = SnapshotObject {
            key: self.key.clone(),
            body: serde_json::to_string(snapshot)?,
            content_type: "application/json".into(),
            cache_control: self.cache_control.clone(),
            generated_at: snapshot.last_updated,
        };
        self.publisher.publish(object).await.map_err(SnapshotError::Publish)
    }

    /// Builds and publishes one generation. On failure the previously
    /// published object stays live.
    pub async fn refresh(&self) -> Result<AggregationSnapshot, SnapshotError> {
        let started = Instant::now();
        let snapshot = self.build_snapshot().await?;
        self.publish(&snapshot).await?;
        info!(
            "✅ Snapshot published in {}ms: {} candidates, {} votes",
            started.elapsed().as_millis(),
            snapshot.candidates.len(),
            snapshot.total_votes
        );
        Ok(snapshot)
    }

    /// Asks the running loop to rebuild before its next tick.
    pub fn request_rebuild(&self) {
        self.rebuild.notify_one();
    }

    pub async fn run(self: Arc<Self>, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🔄 Snapshot builder started, every {}s", every.as_secs());

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.rebuild.notified() => {}
                _ = shutdown.changed() => break,
            }
            if let Err(e) = self.refresh().await {
                error!("❌ Snapshot refresh failed, keeping last published: {}", e);
            }
        }
        info!("Snapshot builder stopped");
    }
}
