use serde::{Serialize, Deserialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;

/// Separator between the candidate id and the shard suffix in a shard key.
pub const SHARD_SEPARATOR: &str = "#SHARD_";

/// Queue message and direct-call payload. Both fields are optional on the wire
/// so a malformed message can be told apart from an unparsable one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<String>,
}

impl VoteRequest {
    pub fn new(user_id: impl Into<String>, candidate_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            candidate_id: Some(candidate_id.into()),
        }
    }
}

/// Body of `POST /api/vote`; the voter comes from the trusted identity header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVoteRequest {
    pub candidate_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QueuedVote {
    pub message_id: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum VoteStatus {
    Accepted {
        #[serde(rename = "shardIndex")]
        shard_index: u32,
    },
    AlreadyVoted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "backend", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub candidate_id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", default)]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCandidateRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Partial update; immutable fields are simply not representable here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CandidateUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.image_url.is_none()
    }

    pub fn apply(&self, candidate: &mut Candidate) {
        if let Some(name) = &self.name {
            candidate.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            candidate.description = description.clone();
        }
        if let Some(image_url) = &self.image_url {
            candidate.image_url = image_url.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardKey {
    pub candidate_id: String,
    pub shard_index: u32,
}

impl ShardKey {
    pub fn new(candidate_id: impl Into<String>, shard_index: u32) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            shard_index,
        }
    }
}

impl fmt::Display for ShardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.candidate_id, SHARD_SEPARATOR, self.shard_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Malformed shard key: {0}")]
pub struct ShardKeyParseError(pub String);

impl FromStr for ShardKey {
    type Err = ShardKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (candidate_id, index) = s
            .rsplit_once(SHARD_SEPARATOR)
            .ok_or_else(|| ShardKeyParseError(s.to_string()))?;
        if candidate_id.is_empty() {
            return Err(ShardKeyParseError(s.to_string()));
        }
        let shard_index = index.parse().map_err(|_| ShardKeyParseError(s.to_string()))?;
        Ok(ShardKey::new(candidate_id, shard_index))
    }
}

/// One row of the sharded counter table as returned by a full scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShardRecord {
    pub shard_key: String,
    /// Denormalized parent id; older rows may lack it.
    pub candidate_id: Option<String>,
    pub votes: u64,
}

impl ShardRecord {
    pub fn new(key: &ShardKey, votes: u64) -> Self {
        Self {
            shard_key: key.to_string(),
            candidate_id: Some(key.candidate_id.clone()),
            votes,
        }
    }

    /// Parent candidate, falling back to the prefix of the shard key.
    pub fn parent_candidate(&self) -> &str {
        match &self.candidate_id {
            Some(id) if !id.is_empty() => id.as_str(),
            _ => self
                .shard_key
                .split('#')
                .next()
                .unwrap_or(self.shard_key.as_str()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub candidate_id: String,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub votes: u64,
}

impl CandidateResult {
    pub fn from_candidate(candidate: &Candidate, votes: u64) -> Self {
        Self {
            candidate_id: candidate.candidate_id.clone(),
            name: candidate.name.clone(),
            description: candidate.description.clone(),
            image_url: candidate.image_url.clone(),
            votes,
        }
    }
}

/// Immutable, fully aggregated view of all candidate totals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AggregationSnapshot {
    pub candidates: Vec<CandidateResult>,
    pub total_votes: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    /// Milliseconds since the unix epoch at generation time.
    pub timestamp: i64,
}

impl AggregationSnapshot {
    pub fn candidate(&self, candidate_id: &str) -> Option<&CandidateResult> {
        self.candidates.iter().find(|c| c.candidate_id == candidate_id)
    }

    pub fn votes_for(&self, candidate_id: &str) -> Option<u64> {
        self.candidate(candidate_id).map(|c| c.votes)
    }

    /// Totals only, ignoring generation metadata.
    pub fn same_totals(&self, other: &AggregationSnapshot) -> bool {
        self.candidates == other.candidates && self.total_votes == other.total_votes
    }
}

/// Partial batch failure report: one entry per message to redeliver.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub batch_item_failures: Vec<BatchItemFailure>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

impl BatchResponse {
    pub fn is_empty(&self) -> bool {
        self.batch_item_failures.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.batch_item_failures.iter().map(|f| f.item_identifier.as_str())
    }
}
