use serde::{Serialize, Deserialize};

/// Header carrying the authenticated subject id, set by the upstream authorizer
/// after token verification. Requests reaching this service are trusted.
pub const VOTER_ID_HEADER: &str = "X-Voter-Id";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VoterIdentity {
    pub voter_id: String,
}

impl VoterIdentity {
    pub fn from_header(value: Option<&str>) -> Option<Self> {
        let voter_id = value?.trim();
        if voter_id.is_empty() {
            return None;
        }
        Some(Self { voter_id: voter_id.to_string() })
    }
}

#[cfg(feature = "backend")]
mod backend_impl {
    use super::*;
    use rocket::http::Status;
    use rocket::request::{FromRequest, Outcome};
    use rocket::Request;

    #[rocket::async_trait]
    impl<'r> FromRequest<'r> for VoterIdentity {
        type Error = ();

        async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
            match VoterIdentity::from_header(req.headers().get_one(VOTER_ID_HEADER)) {
                Some(identity) => Outcome::Success(identity),
                None => Outcome::Error((Status::Unauthorized, ())),
            }
        }
    }
}
