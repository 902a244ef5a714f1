use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, request::Parts};

/// Whether the request was sent as a background fetch
/// (`X-Requested-With: XMLHttpRequest`) rather than a page navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Xhr(pub bool);

pub fn is_xhr(headers: &HeaderMap) -> bool {
    headers
        .get("x-requested-with")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
}

impl<S> FromRequestParts<S> for Xhr
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Xhr(is_xhr(&parts.headers)))
    }
}
