#[cfg(test)]
mod tests {
    use time::{Duration, OffsetDateTime};
    use crate::models::*;
    use crate::tally::Tally;
    use crate::validation::*;
    use crate::identity::VoterIdentity;

    fn candidate(id: &str, created_offset_secs: i64) -> Candidate {
        Candidate {
            candidate_id: id.into(),
            name: format!("Name {id}"),
            description: String::new(),
            image_url: String::new(),
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(created_offset_secs),
            updated_at: None,
        }
    }

    fn shard(candidate_id: &str, index: u32, votes: u64) -> ShardRecord {
        ShardRecord::new(&ShardKey::new(candidate_id, index), votes)
    }

    #[test]
    fn test_vote_validation() {
        assert!(validate_vote("u1", "candA").is_ok());
        assert_eq!(
            validate_vote(" u1 ", " candA "),
            Ok(ValidVote { voter_id: "u1", candidate_id: "candA" })
        );
        assert_eq!(validate_vote("", "candA"), Err(ValidationError::MissingVoterId));
        assert_eq!(validate_vote("   ", "candA"), Err(ValidationError::MissingVoterId));
        assert_eq!(validate_vote("u1", ""), Err(ValidationError::MissingCandidateId));
        assert_eq!(validate_vote("u1", "cand#1"), Err(ValidationError::ReservedCharacter));
        assert_eq!(validate_vote(&"x".repeat(MAX_ID_LENGTH + 1), "candA"), Err(ValidationError::IdTooLong));

        let vote = validate_vote("  u1 ", " candA").unwrap();
        assert_eq!(vote.voter_id, "u1");
        assert_eq!(vote.candidate_id, "candA");
    }

    #[test]
    fn test_vote_request_missing_fields() {
        let missing_user = VoteRequest { user_id: None, candidate_id: Some("candA".into()) };
        assert_eq!(validate_vote_request(&missing_user), Err(ValidationError::MissingVoterId));

        let missing_candidate = VoteRequest { user_id: Some("u1".into()), candidate_id: None };
        assert_eq!(validate_vote_request(&missing_candidate), Err(ValidationError::MissingCandidateId));

        assert!(validate_vote_request(&VoteRequest::new("u1", "candA")).is_ok());
    }

    #[test]
    fn test_vote_request_wire_format() {
        let parsed: VoteRequest = serde_json::from_str(r#"{"userId":"u1","candidateId":"candA","extra":1}"#).unwrap();
        assert_eq!(parsed, VoteRequest::new("u1", "candA"));

        let partial: VoteRequest = serde_json::from_str(r#"{"candidateId":"candA"}"#).unwrap();
        assert_eq!(partial.user_id, None);
    }

    #[test]
    fn test_candidate_validation() {
        let ok = CreateCandidateRequest { name: "Alice".into(), description: None, image_url: None };
        assert!(validate_candidate_request(&ok).is_ok());

        let blank = CreateCandidateRequest { name: " ".into(), description: None, image_url: None };
        assert_eq!(validate_candidate_request(&blank), Err(ValidationError::MissingName));

        let long = CreateCandidateRequest {
            name: "Bob".into(),
            description: Some("d".repeat(MAX_DESCRIPTION_LENGTH + 1)),
            image_url: None,
        };
        assert_eq!(validate_candidate_request(&long), Err(ValidationError::DescriptionTooLong));

        assert_eq!(validate_candidate_update(&CandidateUpdate::default()), Err(ValidationError::EmptyUpdate));
        let rename = CandidateUpdate { name: Some("Carol".into()), ..Default::default() };
        assert!(validate_candidate_update(&rename).is_ok());
    }

    #[test]
    fn test_candidate_update_apply() {
        let mut c = candidate("candA", 0);
        CandidateUpdate { description: Some("new".into()), ..Default::default() }.apply(&mut c);
        assert_eq!(c.description, "new");
        assert_eq!(c.name, "Name candA");
        assert_eq!(c.candidate_id, "candA");

        CandidateUpdate { name: Some("  Bob ".into()), ..Default::default() }.apply(&mut c);
        assert_eq!(c.name, "Bob");
    }

    #[test]
    fn test_shard_key_format() {
        let key = ShardKey::new("candA", 7);
        assert_eq!(key.to_string(), "candA#SHARD_7");
        assert_eq!("candA#SHARD_7".parse::<ShardKey>().unwrap(), key);
        assert!("candA".parse::<ShardKey>().is_err());
        assert!("#SHARD_1".parse::<ShardKey>().is_err());
        assert!("candA#SHARD_x".parse::<ShardKey>().is_err());
    }

    #[test]
    fn test_parent_candidate_fallback() {
        let legacy = ShardRecord { shard_key: "candB#SHARD_3".into(), candidate_id: None, votes: 4 };
        assert_eq!(legacy.parent_candidate(), "candB");

        let empty = ShardRecord { shard_key: "candC#SHARD_0".into(), candidate_id: Some(String::new()), votes: 1 };
        assert_eq!(empty.parent_candidate(), "candC");

        assert_eq!(shard("candA", 2, 1).parent_candidate(), "candA");
    }

    #[test]
    fn test_tally_rolls_up_shards() {
        let shards = [
            shard("candA", 0, 3),
            shard("candA", 4, 2),
            shard("candB", 1, 5),
            ShardRecord { shard_key: "candA#SHARD_9".into(), candidate_id: None, votes: 1 },
        ];
        let tally: Tally = shards.iter().collect();
        assert_eq!(tally.total("candA"), 6);
        assert_eq!(tally.total("candB"), 5);
        assert_eq!(tally.total("candZ"), 0);
        assert_eq!(tally.shards_seen(), 4);
        assert_eq!(tally.candidates_seen(), 2);
    }

    #[test]
    fn test_snapshot_left_join() {
        let shards = [shard("candA", 0, 3), shard("gone", 2, 8)];
        let tally: Tally = shards.iter().collect();
        let now = OffsetDateTime::UNIX_EPOCH + Duration::seconds(100);

        let (snapshot, orphans) = tally.into_snapshot(vec![candidate("candB", 5), candidate("candA", 10)], now);

        let ids: Vec<_> = snapshot.candidates.iter().map(|c| c.candidate_id.as_str()).collect();
        assert_eq!(ids, ["candB", "candA"]);
        assert_eq!(snapshot.votes_for("candA"), Some(3));
        assert_eq!(snapshot.votes_for("candB"), Some(0));
        assert_eq!(snapshot.votes_for("gone"), None);
        assert_eq!(snapshot.total_votes, 3);
        assert_eq!(snapshot.timestamp, 100_000);
        assert_eq!(orphans.candidates, 1);
        assert_eq!(orphans.votes, 8);
    }

    #[test]
    fn test_snapshot_serialization() {
        let tally: Tally = [shard("candA", 0, 2)].iter().collect();
        let (snapshot, _) = tally.into_snapshot(vec![candidate("candA", 0)], OffsetDateTime::UNIX_EPOCH);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["candidates"][0]["candidateId"], "candA");
        assert_eq!(json["candidates"][0]["imageUrl"], "");
        assert_eq!(json["candidates"][0]["votes"], 2);
        assert_eq!(json["lastUpdated"], "1970-01-01T00:00:00Z");

        let back: AggregationSnapshot = serde_json::from_value(json).unwrap();
        assert!(back.same_totals(&snapshot));
    }

    #[test]
    fn test_voter_identity_header() {
        assert_eq!(VoterIdentity::from_header(Some(" sub-1 ")).unwrap().voter_id, "sub-1");
        assert!(VoterIdentity::from_header(Some("")).is_none());
        assert!(VoterIdentity::from_header(None).is_none());
    }

    #[test]
    fn test_vote_status_wire_format() {
        let accepted = serde_json::to_value(VoteStatus::Accepted { shard_index: 3 }).unwrap();
        assert_eq!(accepted["status"], "accepted");
        assert_eq!(accepted["shardIndex"], 3);
        assert_eq!(serde_json::to_value(VoteStatus::AlreadyVoted).unwrap()["status"], "alreadyVoted");
    }

    #[test]
    fn test_error_codes_map_to_status() {
        use crate::error::{Error, ErrorCode};
        assert_eq!(ErrorCode::AlreadyVoted.status(), 409);
        assert_eq!(ErrorCode::Unavailable.status(), 503);
        let err = Error::with_details(ErrorCode::InvalidInput, "Invalid vote", "Voter id is required");
        assert_eq!(err.to_string(), "Invalid input provided: Invalid vote (Voter id is required)");
    }
}
