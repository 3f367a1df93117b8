use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;
use shared::models::{AggregationSnapshot, CandidateResult, ShardKey};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::store::{CandidateRepository, CounterStore, SnapshotStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("Results are not available yet")]
    NotReady,
    #[error("Candidate not found")]
    NotFound,
    #[error("Published snapshot is unreadable: {0}")]
    Malformed(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A fetched snapshot: the raw published body plus its parsed form.
#[derive(Debug)]
pub struct PublishedResults {
    pub snapshot: AggregationSnapshot,
    pub body: String,
    pub cache_control: String,
}

struct Cached {
    results: Arc<PublishedResults>,
    fetched_at: Instant,
}

/// Serves the latest published snapshot. Each instance keeps an immutable
/// copy for `ttl` and then replaces it wholesale; there is no cross-instance
/// invalidation. Shards are never scanned on this path.
pub struct ResultsReader {
    source: Arc<dyn SnapshotStore>,
    candidates: Arc<dyn CandidateRepository>,
    counters: Arc<dyn CounterStore>,
    key: String,
    shard_count: u32,
    ttl: Duration,
    fetch_timeout: Duration,
    cached: RwLock<Option<Cached>>,
    refreshing: Mutex<()>,
}

impl ResultsReader {
    pub fn new(
        source: Arc<dyn SnapshotStore>,
        candidates: Arc<dyn CandidateRepository>,
        counters: Arc<dyn CounterStore>,
        key: impl Into<String>,
        shard_count: u32,
        ttl: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            source,
            candidates,
            counters,
            key: key.into(),
            shard_count: shard_count.max(1),
            ttl,
            fetch_timeout,
            cached: RwLock::new(None),
            refreshing: Mutex::new(()),
        }
    }

    pub async fn get_results(&self) -> Result<Arc<PublishedResults>, ReadError> {
        let stale = match self.cached.read().await.as_ref() {
            Some(cached) if cached.fetched_at.elapsed() < self.ttl => return Ok(Arc::clone(&cached.results)),
            Some(cached) => Some(Arc::clone(&cached.results)),
            None => None,
        };

        // One refresh at a time. While it runs, callers holding a stale copy
        // are served that copy instead of waiting for the fetch.
        let _refresh = match &stale {
            Some(stale) => match self.refreshing.try_lock() {
                Ok(guard) => guard,
                Err(_) => return Ok(Arc::clone(stale)),
            },
            None => self.refreshing.lock().await,
        };
        if let Some(current) = self.cached.read().await.as_ref() {
            if current.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&current.results));
            }
        }

        let fetched = tokio::time::timeout(self.fetch_timeout, self.fetch())
            .await
            .unwrap_or(Err(ReadError::Store(StoreError::Timeout)));
        match fetched {
            Ok(results) => {
                *self.cached.write().await = Some(Cached { results: Arc::clone(&results), fetched_at: Instant::now() });
                Ok(results)
            }
            Err(e) => match stale {
                Some(stale) => {
                    warn!("Serving stale results, refresh failed: {}", e);
                    Ok(stale)
                }
                None => Err(e),
            },
        }
    }

    async fn fetch(&self) -> Result<Arc<PublishedResults>, ReadError> {
        let object = self.source.fetch_latest(&self.key).await?.ok_or(ReadError::NotReady)?;
        let snapshot: AggregationSnapshot =
            serde_json::from_str(&object.body).map_err(|e| ReadError::Malformed(e.to_string()))?;
        debug!("Fetched snapshot generated at {}", snapshot.last_updated);
        Ok(Arc::new(PublishedResults {
            snapshot,
            body: object.body,
            cache_control: object.cache_control,
        }))
    }

    /// One candidate with its total. Candidates newer than the latest snapshot
    /// are summed from their `shard_count` point reads.
    pub async fn get_candidate(&self, candidate_id: &str) -> Result<CandidateResult, ReadError> {
        match self.get_results().await {
            Ok(results) => {
                if let Some(found) = results.snapshot.candidate(candidate_id) {
                    return Ok(found.clone());
                }
            }
            Err(ReadError::NotReady) => {}
            Err(e) => return Err(e),
        }

        let candidate = self
            .candidates
            .get_candidate(candidate_id)
            .await?
            .ok_or(ReadError::NotFound)?;

        let reads = (0..self.shard_count).map(|index| {
            let key = ShardKey::new(candidate_id, index);
            async move { self.counters.read_shard(&key).await }
        });
        let votes = try_join_all(reads)
            .await?
            .into_iter()
            .fold(0u64, |sum, v| sum.saturating_add(v));

        Ok(CandidateResult::from_candidate(&candidate, votes))
    }
}
