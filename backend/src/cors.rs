use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};
use rocket::http::Header;

/// Adds CORS headers. With no configured origin every origin is allowed,
/// since the results endpoint is public and votes carry a gateway-issued identity.
pub struct Cors {
    allowed_origin: Option<String>,
}

impl Cors {
    pub fn new(allowed_origin: Option<String>) -> Self {
        Self { allowed_origin }
    }

    fn origin_for(&self, request_origin: Option<&str>) -> Option<String> {
        match (&self.allowed_origin, request_origin) {
            (None, _) => Some("*".into()),
            (Some(allowed), Some(origin)) if allowed == origin => Some(origin.to_string()),
            _ => None,
        }
    }
}

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "CORS",
            kind: Kind::Response
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        if let Some(origin) = self.origin_for(req.headers().get_one("Origin")) {
            res.set_header(Header::new("Access-Control-Allow-Origin", origin));
            res.set_header(Header::new("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"));
            res.set_header(Header::new("Access-Control-Allow-Headers", "Content-Type, Authorization, X-Voter-Id"));
            res.set_header(Header::new("Access-Control-Max-Age", "86400"));
        }
    }
}
