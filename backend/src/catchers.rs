use rocket::{Request, catch, serde::json::Json};
use shared::error::{Error, ErrorCode};

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::InvalidInput, "Invalid request parameters."))
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::Unauthorized, "A verified voter identity is required."))
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::NotFound, "The requested resource was not found."))
}

#[catch(409)]
pub fn conflict(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::AlreadyVoted, "You have already voted."))
}

#[catch(422)]
pub fn unprocessable(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::InvalidInput, "Malformed request body."))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::SystemError, "An internal server error occurred."))
}

#[catch(503)]
pub fn unavailable(_req: &Request) -> Json<Error> {
    Json(Error::new(ErrorCode::Unavailable, "Service temporarily unavailable. Please retry."))
}
