use std::sync::Arc;

use rocket::{State, delete, get, post, put, http::Status, serde::json::Json};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use shared::{identity::VoterIdentity, models::*, validation::validate_vote};
use crate::{
    candidates::CandidateService,
    config::{Config, SNAPSHOT_KEY},
    consumer::BatchConsumer,
    coordinator::{VoteCoordinator, VoteOutcome},
    error::ApiError,
    queue::{IngestionQueue, QueueSettings},
    results::ResultsReader,
    snapshot::SnapshotBuilder,
    store::{CandidateRepository, SnapshotStore, VoteStore},
    utils::CachedJson,
};

pub struct AppState {
    pub coordinator: Arc<VoteCoordinator>,
    pub queue: Arc<IngestionQueue>,
    pub consumer: Arc<BatchConsumer>,
    pub snapshots: Arc<SnapshotBuilder>,
    pub results: Arc<ResultsReader>,
    pub candidates: CandidateService,
}

impl AppState {
    /// Wires every component onto one backing store.
    pub fn new<S>(store: Arc<S>, config: &Config) -> Self
    where
        S: VoteStore + CandidateRepository + SnapshotStore + 'static,
    {
        let coordinator = Arc::new(VoteCoordinator::new(store.clone(), config.shard_count, config.store_timeout));
        let snapshots = Arc::new(SnapshotBuilder::new(
            store.clone(),
            store.clone(),
            store.clone(),
            SNAPSHOT_KEY,
            config.snapshot_max_age,
        ));
        let results = Arc::new(ResultsReader::new(
            store.clone(),
            store.clone(),
            store.clone(),
            SNAPSHOT_KEY,
            config.shard_count,
            config.read_cache_ttl,
            config.store_timeout,
        ));

        Self {
            consumer: Arc::new(BatchConsumer::new(Arc::clone(&coordinator))),
            queue: Arc::new(IngestionQueue::new(QueueSettings::from(config))),
            candidates: CandidateService::new(store, Arc::clone(&snapshots)),
            coordinator,
            snapshots,
            results,
        }
    }

    /// Starts the consumer pool and the snapshot loop.
    pub fn spawn_workers(&self, config: &Config, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let mut handles: Vec<JoinHandle<()>> = (0..config.consumer_workers.max(1))
            .map(|_| {
                tokio::spawn(Arc::clone(&self.consumer).run(
                    Arc::clone(&self.queue),
                    config.batch_size,
                    shutdown.clone(),
                ))
            })
            .collect();
        handles.push(tokio::spawn(
            Arc::clone(&self.snapshots).run(config.snapshot_interval, shutdown),
        ));
        handles
    }
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[instrument(skip(state, voter, request), fields(voter = %voter.voter_id))]
#[post("/vote", format = "json", data = "<request>")]
pub async fn cast_vote(
    state: &State<AppState>,
    voter: VoterIdentity,
    request: Json<CastVoteRequest>,
) -> Result<(Status, Json<QueuedVote>), ApiError> {
    let request = request.into_inner();
    let vote = validate_vote(&voter.voter_id, &request.candidate_id)?;

    let message_id = state.queue.send_vote(&VoteRequest::new(vote.voter_id, vote.candidate_id))?;
    debug!("Queued vote {} for {}", message_id, vote.candidate_id);

    Ok((Status::Accepted, Json(QueuedVote { message_id: message_id.to_string() })))
}

#[instrument(skip(state, voter, request), fields(voter = %voter.voter_id))]
#[post("/vote/direct", format = "json", data = "<request>")]
pub async fn cast_vote_direct(
    state: &State<AppState>,
    voter: VoterIdentity,
    request: Json<CastVoteRequest>,
) -> Result<Json<VoteStatus>, ApiError> {
    match state.coordinator.submit_vote(&voter.voter_id, &request.candidate_id).await? {
        VoteOutcome::Accepted { shard } => Ok(Json(VoteStatus::Accepted { shard_index: shard.shard_index })),
        VoteOutcome::AlreadyVoted => Err(ApiError::AlreadyVoted),
        VoteOutcome::TransientFailure(e) => Err(ApiError::Unavailable(e.to_string())),
    }
}

#[get("/results")]
pub async fn get_results(state: &State<AppState>) -> Result<CachedJson, ApiError> {
    let results = state.results.get_results().await?;
    Ok(CachedJson::new(results.body.clone(), results.cache_control.clone()))
}

#[get("/candidates/<id>")]
pub async fn get_candidate(state: &State<AppState>, id: &str) -> Result<Json<CandidateResult>, ApiError> {
    state.results.get_candidate(id).await.map(Json).map_err(ApiError::from)
}

#[instrument(skip(state, request))]
#[post("/candidates", format = "json", data = "<request>")]
pub async fn create_candidate(
    state: &State<AppState>,
    request: Json<CreateCandidateRequest>,
) -> Result<(Status, Json<Candidate>), ApiError> {
    let candidate = state.candidates.create(request.into_inner()).await?;
    Ok((Status::Created, Json(candidate)))
}

#[instrument(skip(state, update))]
#[put("/candidates/<id>", format = "json", data = "<update>")]
pub async fn update_candidate(
    state: &State<AppState>,
    id: &str,
    update: Json<CandidateUpdate>,
) -> Result<Json<Candidate>, ApiError> {
    Ok(Json(state.candidates.update(id, update.into_inner()).await?))
}

#[instrument(skip(state))]
#[delete("/candidates/<id>")]
pub async fn delete_candidate(state: &State<AppState>, id: &str) -> Result<Status, ApiError> {
    state.candidates.delete(id).await?;
    Ok(Status::NoContent)
}
