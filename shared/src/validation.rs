use crate::models::{CandidateUpdate, CreateCandidateRequest, VoteRequest};

pub const MAX_ID_LENGTH: usize = 128;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 500;
pub const MAX_IMAGE_URL_LENGTH: usize = 2048;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Voter id is required")]
    MissingVoterId,
    #[error("Candidate id is required")]
    MissingCandidateId,
    #[error("Id exceeds maximum length of {MAX_ID_LENGTH}")]
    IdTooLong,
    #[error("Candidate id may not contain '#'")]
    ReservedCharacter,
    #[error("Candidate name is required")]
    MissingName,
    #[error("Name exceeds maximum length of {MAX_NAME_LENGTH}")]
    NameTooLong,
    #[error("Description exceeds maximum length of {MAX_DESCRIPTION_LENGTH}")]
    DescriptionTooLong,
    #[error("Image url exceeds maximum length of {MAX_IMAGE_URL_LENGTH}")]
    ImageUrlTooLong,
    #[error("No valid fields to update")]
    EmptyUpdate,
}

/// A vote that passed validation, borrowed from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidVote<'a> {
    pub voter_id: &'a str,
    pub candidate_id: &'a str,
}

pub fn validate_voter_id(voter_id: &str) -> Result<&str, ValidationError> {
    let voter_id = voter_id.trim();
    if voter_id.is_empty() { return Err(ValidationError::MissingVoterId); }
    if voter_id.len() > MAX_ID_LENGTH { return Err(ValidationError::IdTooLong); }
    Ok(voter_id)
}

pub fn validate_candidate_id(candidate_id: &str) -> Result<&str, ValidationError> {
    let candidate_id = candidate_id.trim();
    if candidate_id.is_empty() { return Err(ValidationError::MissingCandidateId); }
    if candidate_id.len() > MAX_ID_LENGTH { return Err(ValidationError::IdTooLong); }
    if candidate_id.contains('#') { return Err(ValidationError::ReservedCharacter); }
    Ok(candidate_id)
}

pub fn validate_vote<'a>(voter_id: &'a str, candidate_id: &'a str) -> Result<ValidVote<'a>, ValidationError> {
    Ok(ValidVote {
        voter_id: validate_voter_id(voter_id)?,
        candidate_id: validate_candidate_id(candidate_id)?,
    })
}

pub fn validate_vote_request(request: &VoteRequest) -> Result<ValidVote<'_>, ValidationError> {
    let voter_id = request.user_id.as_deref().ok_or(ValidationError::MissingVoterId)?;
    let candidate_id = request.candidate_id.as_deref().ok_or(ValidationError::MissingCandidateId)?;
    validate_vote(voter_id, candidate_id)
}

fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() { return Err(ValidationError::MissingName); }
    if name.len() > MAX_NAME_LENGTH { return Err(ValidationError::NameTooLong); }
    Ok(())
}

fn validate_details(description: Option<&str>, image_url: Option<&str>) -> Result<(), ValidationError> {
    if description.is_some_and(|d| d.len() > MAX_DESCRIPTION_LENGTH) { return Err(ValidationError::DescriptionTooLong); }
    if image_url.is_some_and(|u| u.len() > MAX_IMAGE_URL_LENGTH) { return Err(ValidationError::ImageUrlTooLong); }
    Ok(())
}

pub fn validate_candidate_request(request: &CreateCandidateRequest) -> Result<(), ValidationError> {
    validate_name(&request.name)?;
    validate_details(request.description.as_deref(), request.image_url.as_deref())
}

pub fn validate_candidate_update(update: &CandidateUpdate) -> Result<(), ValidationError> {
    if update.is_empty() { return Err(ValidationError::EmptyUpdate); }
    if let Some(name) = &update.name {
        validate_name(name)?;
    }
    validate_details(update.description.as_deref(), update.image_url.as_deref())
}
