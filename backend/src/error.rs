use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use shared::error::{Error, ErrorCode};
use shared::validation::ValidationError;
use thiserror::Error;

use crate::candidates::CandidateError;
use crate::queue::QueueError;
use crate::results::ReadError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error("Not found")]
    NotFound,
    #[error("Already voted")]
    AlreadyVoted,
    #[error("Temporarily unavailable: {0}")]
    Unavailable(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Validation(_) => ErrorCode::InvalidInput,
            ApiError::NotFound => ErrorCode::NotFound,
            ApiError::AlreadyVoted => ErrorCode::AlreadyVoted,
            ApiError::Unavailable(_) => ErrorCode::Unavailable,
            ApiError::Internal(_) => ErrorCode::SystemError,
        }
    }

    fn body(&self) -> Error {
        match self {
            ApiError::Validation(e) => Error::with_details(self.code(), "Invalid request", e.to_string()),
            // Storage internals stay in the logs.
            ApiError::Internal(_) => Error::new(self.code(), "An internal server error occurred"),
            _ => Error::new(self.code(), self.to_string()),
        }
    }
}

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Full(_) => ApiError::Unavailable(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ReadError> for ApiError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::NotFound => ApiError::NotFound,
            ReadError::NotReady | ReadError::Store(_) => ApiError::Unavailable(e.to_string()),
            ReadError::Malformed(_) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<CandidateError> for ApiError {
    fn from(e: CandidateError) -> Self {
        match e {
            CandidateError::Invalid(v) => ApiError::Validation(v),
            CandidateError::NotFound => ApiError::NotFound,
            CandidateError::Store(s) => ApiError::Unavailable(s.to_string()),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for ApiError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = Status::from_code(self.code().status()).unwrap_or(Status::InternalServerError);

        rocket::Response::build_from(Json(self.body()).respond_to(req)?)
            .status(status)
            .ok()
    }
}
