use futures::stream::{BoxStream, StreamExt};
use sqlx::{PgExecutor, PgPool};
use shared::models::*;
use time::OffsetDateTime;

use crate::store::*;

const CANDIDATE_COLUMNS: &str = "candidate_id, name, description, image_url, created_at, updated_at";

/// PostgreSQL backend. The ledger and shard tables live in the `voting`
/// schema created by the migrations in `backend/migrations`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct ShardRow {
    shard_key: String,
    candidate_id: Option<String>,
    votes: i64,
}

impl ShardRow {
    fn into_record(self) -> Result<ShardRecord, StoreError> {
        let votes = to_count(&self.shard_key, self.votes)?;
        let candidate_id = match self.candidate_id {
            Some(id) => id,
            None => {
                let key: ShardKey = self.shard_key.parse().map_err(|e: ShardKeyParseError| StoreError::Corrupt {
                    key: self.shard_key.clone(),
                    reason: e.to_string(),
                })?;
                key.candidate_id
            }
        };
        Ok(ShardRecord {
            shard_key: self.shard_key,
            candidate_id: Some(candidate_id),
            votes,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    object_key: String,
    body: String,
    content_type: String,
    cache_control: String,
    generated_at: OffsetDateTime,
}

impl From<SnapshotRow> for SnapshotObject {
    fn from(row: SnapshotRow) -> Self {
        SnapshotObject {
            key: row.object_key,
            body: row.body,
            content_type: row.content_type,
            cache_control: row.cache_control,
            generated_at: row.generated_at,
        }
    }
}

fn to_count(key: &str, votes: i64) -> Result<u64, StoreError> {
    u64::try_from(votes).map_err(|_| StoreError::Corrupt {
        key: key.to_string(),
        reason: format!("negative vote count {}", votes),
    })
}

/// Sorts sqlx errors into retryable and non-retryable buckets.
fn map_err(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
        // serialization_failure, deadlock_detected, lock_not_available, query_canceled
        sqlx::Error::Database(db)
            if matches!(db.code().as_deref(), Some("40001" | "40P01" | "55P03" | "57014")) =>
        {
            StoreError::Unavailable(e.to_string())
        }
        _ => StoreError::Backend(e.to_string()),
    }
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn upsert_shard<'e, E: PgExecutor<'e>>(executor: E, key: &ShardKey, by: u64) -> Result<(), StoreError> {
        let by = i64::try_from(by).map_err(|_| StoreError::Backend(format!("increment {} out of range", by)))?;
        sqlx::query(
            "INSERT INTO voting.vote_shards (shard_key, candidate_id, shard_index, votes)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (shard_key) DO UPDATE
             SET votes = voting.vote_shards.votes + EXCLUDED.votes,
                 candidate_id = EXCLUDED.candidate_id",
        )
        .bind(key.to_string())
        .bind(&key.candidate_id)
        .bind(i64::from(key.shard_index))
        .bind(by)
        .execute(executor)
        .await
        .map_err(map_err)?;
        Ok(())
    }
}

#[rocket::async_trait]
impl CounterStore for PgStore {
    async fn increment(&self, key: &ShardKey, by: u64) -> Result<(), StoreError> {
        Self::upsert_shard(&self.pool, key, by).await
    }

    async fn read_shard(&self, key: &ShardKey) -> Result<u64, StoreError> {
        let shard_key = key.to_string();
        let votes: Option<i64> = sqlx::query_scalar("SELECT votes FROM voting.vote_shards WHERE shard_key = $1")
            .bind(&shard_key)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)?;
        votes.map_or(Ok(0), |v| to_count(&shard_key, v))
    }

    fn scan_all(&self) -> BoxStream<'_, Result<ShardRecord, StoreError>> {
        sqlx::query_as::<_, ShardRow>("SELECT shard_key, candidate_id, votes FROM voting.vote_shards")
            .fetch(&self.pool)
            .map(|row| row.map_err(map_err).and_then(ShardRow::into_record))
            .boxed()
    }
}

#[rocket::async_trait]
impl IdempotencyLedger for PgStore {
    async fn try_claim(&self, voter_id: &str) -> Result<Claim, StoreError> {
        let result = sqlx::query("INSERT INTO voting.voter_records (voter_id) VALUES ($1) ON CONFLICT (voter_id) DO NOTHING")
            .bind(voter_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(if result.rows_affected() == 0 { Claim::AlreadyClaimed } else { Claim::Claimed })
    }
}

#[rocket::async_trait]
impl VoteStore for PgStore {
    async fn claim_and_increment(&self, voter_id: &str, key: &ShardKey) -> Result<Claim, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_err)?;

        // A concurrent insert for the same voter blocks on the primary key
        // until the other transaction finishes, then affects zero rows.
        let claimed = sqlx::query("INSERT INTO voting.voter_records (voter_id) VALUES ($1) ON CONFLICT (voter_id) DO NOTHING")
            .bind(voter_id)
            .execute(&mut *tx)
            .await
            .map_err(map_err)?;

        if claimed.rows_affected() == 0 {
            tx.rollback().await.map_err(map_err)?;
            return Ok(Claim::AlreadyClaimed);
        }

        Self::upsert_shard(&mut *tx, key, 1).await?;
        tx.commit().await.map_err(map_err)?;
        Ok(Claim::Claimed)
    }
}

#[rocket::async_trait]
impl CandidateRepository for PgStore {
    async fn list_candidates(&self) -> Result<Vec<Candidate>, StoreError> {
        sqlx::query_as::<_, Candidate>(&format!("SELECT {} FROM voting.candidates", CANDIDATE_COLUMNS))
            .fetch_all(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn get_candidate(&self, candidate_id: &str) -> Result<Option<Candidate>, StoreError> {
        sqlx::query_as::<_, Candidate>(&format!("SELECT {} FROM voting.candidates WHERE candidate_id = $1", CANDIDATE_COLUMNS))
            .bind(candidate_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_err)
    }

    async fn insert_candidate(&self, candidate: &Candidate) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO voting.candidates (candidate_id, name, description, image_url, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&candidate.candidate_id)
        .bind(&candidate.name)
        .bind(&candidate.description)
        .bind(&candidate.image_url)
        .bind(candidate.created_at)
        .bind(candidate.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn update_candidate(
        &self,
        candidate_id: &str,
        update: &CandidateUpdate,
        updated_at: OffsetDateTime,
    ) -> Result<Option<Candidate>, StoreError> {
        sqlx::query_as::<_, Candidate>(&format!(
            "UPDATE voting.candidates
             SET name = COALESCE($2, name),
                 description = COALESCE($3, description),
                 image_url = COALESCE($4, image_url),
                 updated_at = $5
             WHERE candidate_id = $1
             RETURNING {}",
            CANDIDATE_COLUMNS
        ))
        .bind(candidate_id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.description.as_deref())
        .bind(update.image_url.as_deref())
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)
    }

    async fn delete_candidate(&self, candidate_id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM voting.candidates WHERE candidate_id = $1")
            .bind(candidate_id)
            .execute(&self.pool)
            .await
            .map_err(map_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[rocket::async_trait]
impl SnapshotStore for PgStore {
    async fn publish(&self, object: SnapshotObject) -> Result<(), StoreError> {
        // Older generations never overwrite newer ones when several
        // instances publish concurrently.
        sqlx::query(
            "INSERT INTO voting.published_snapshots (object_key, body, content_type, cache_control, generated_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (object_key) DO UPDATE
             SET body = EXCLUDED.body,
                 content_type = EXCLUDED.content_type,
                 cache_control = EXCLUDED.cache_control,
                 generated_at = EXCLUDED.generated_at
             WHERE voting.published_snapshots.generated_at <= EXCLUDED.generated_at",
        )
        .bind(&object.key)
        .bind(&object.body)
        .bind(&object.content_type)
        .bind(&object.cache_control)
        .bind(object.generated_at)
        .execute(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(())
    }

    async fn fetch_latest(&self, key: &str) -> Result<Option<SnapshotObject>, StoreError> {
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT object_key, body, content_type, cache_control, generated_at
             FROM voting.published_snapshots WHERE object_key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_err)?;
        Ok(row.map(SnapshotObject::from))
    }
}
