use std::collections::HashMap;
use time::OffsetDateTime;

use crate::models::{AggregationSnapshot, Candidate, CandidateResult, ShardRecord};

/// Running sum of shard counts per parent candidate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    totals: HashMap<String, u64>,
    shards: usize,
}

/// What the left join onto candidates dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Orphans {
    pub candidates: usize,
    pub votes: u64,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, shard: &ShardRecord) {
        let total = self.totals.entry(shard.parent_candidate().to_string()).or_insert(0);
        *total = total.saturating_add(shard.votes);
        self.shards += 1;
    }

    pub fn total(&self, candidate_id: &str) -> u64 {
        self.totals.get(candidate_id).copied().unwrap_or(0)
    }

    pub fn shards_seen(&self) -> usize {
        self.shards
    }

    pub fn candidates_seen(&self) -> usize {
        self.totals.len()
    }

    /// Left-joins the totals onto `candidates`. Candidates without shards get 0;
    /// totals whose candidate is gone are reported as orphans.
    pub fn into_snapshot(self, mut candidates: Vec<Candidate>, generated_at: OffsetDateTime) -> (AggregationSnapshot, Orphans) {
        candidates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });

        let results: Vec<CandidateResult> = candidates
            .iter()
            .map(|c| CandidateResult::from_candidate(c, self.total(&c.candidate_id)))
            .collect();

        let mut orphans = Orphans::default();
        for (candidate_id, votes) in &self.totals {
            if !candidates.iter().any(|c| &c.candidate_id == candidate_id) {
                orphans.candidates += 1;
                orphans.votes = orphans.votes.saturating_add(*votes);
            }
        }

        let total_votes = results.iter().fold(0u64, |sum, c| sum.saturating_add(c.votes));
        let snapshot = AggregationSnapshot {
            candidates: results,
            total_votes,
            last_updated: generated_at,
            timestamp: unix_millis(generated_at),
        };
        (snapshot, orphans)
    }
}

impl<'a> FromIterator<&'a ShardRecord> for Tally {
    fn from_iter<I: IntoIterator<Item = &'a ShardRecord>>(iter: I) -> Self {
        let mut tally = Tally::new();
        iter.into_iter().for_each(|shard| tally.record(shard));
        tally
    }
}

pub fn unix_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}
