//! Axum extractors

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

use crate::auth::SessionId;

/// Extractor for the current session id
///
/// Requires [`crate::middleware::SessionLayer`] to be applied to the router.
///
/// # Example
///
/// ```rust,ignore
/// use multitwitch::extractors::SessionExtractor;
///
/// async fn handler(SessionExtractor(session_id): SessionExtractor) -> String {
///     session_id.to_string()
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SessionExtractor(pub SessionId);

impl<S> FromRequestParts<S> for SessionExtractor
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<SessionId>()
            .cloned()
            .map(Self)
            .ok_or((StatusCode::INTERNAL_SERVER_ERROR, "Session not initialized"))
    }
}
