use rocket::http::Header;
use rocket::response::content::RawJson;

/// Pre-serialized JSON served with its own `Cache-Control` directive.
#[derive(rocket::Responder)]
pub struct CachedJson {
    inner: RawJson<String>,
    cache_control: Header<'static>,
}

impl CachedJson {
    pub fn new(body: String, cache_control: impl Into<String>) -> Self {
        Self {
            inner: RawJson(body),
            cache_control: Header::new("Cache-Control", cache_control.into()),
        }
    }
}
