use std::sync::Arc;

use shared::models::{Candidate, CandidateUpdate, CreateCandidateRequest};
use shared::validation::{validate_candidate_request, validate_candidate_update, ValidationError};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::snapshot::SnapshotBuilder;
use crate::store::{CandidateRepository, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum CandidateError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Candidate not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Administrative CRUD over candidates. Every change nudges the snapshot
/// builder; other instances pick it up through the published snapshot.
pub struct CandidateService {
    repository: Arc<dyn CandidateRepository>,
    snapshots: Arc<SnapshotBuilder>,
}

impl CandidateService {
    pub fn new(repository: Arc<dyn CandidateRepository>, snapshots: Arc<SnapshotBuilder>) -> Self {
        Self { repository, snapshots }
    }

    pub async fn create(&self, request: CreateCandidateRequest) -> Result<Candidate, CandidateError> {
        validate_candidate_request(&request)?;

        let candidate = Candidate {
            candidate_id: format!("cand-{}", Uuid::new_v4().simple()),
            name: request.name.trim().to_string(),
            description: request.description.unwrap_or_default(),
            image_url: request.image_url.unwrap_or_default(),
            created_at: OffsetDateTime::now_utc(),
            updated_at: None,
        };
        self.repository.insert_candidate(&candidate).await?;
        info!("Created candidate {}", candidate.candidate_id);

        self.snapshots.request_rebuild();
        Ok(candidate)
    }

    pub async fn update(&self, candidate_id: &str, update: CandidateUpdate) -> Result<Candidate, CandidateError> {
        validate_candidate_update(&update)?;

        let updated = self
            .repository
            .update_candidate(candidate_id, &update, OffsetDateTime::now_utc())
            .await?
            .ok_or(CandidateError::NotFound)?;
        info!("Updated candidate {}", candidate_id);

        self.snapshots.request_rebuild();
        Ok(updated)
    }

    /// Vote shards of a deleted candidate are kept; the snapshot's join hides them.
    pub async fn delete(&self, candidate_id: &str) -> Result<(), CandidateError> {
        if !self.repository.delete_candidate(candidate_id).await? {
            return Err(CandidateError::NotFound);
        }
        info!("Deleted candidate {}", candidate_id);

        self.snapshots.request_rebuild();
        Ok(())
    }
}
