//! Session cookie middleware
//!
//! Reads the session id from the session cookie, or mints a new one when
//! the cookie is absent or malformed, and places it in the request
//! extensions for [`crate::extractors::SessionExtractor`]. New ids are
//! sent back in a `Set-Cookie` header.
//!
//! The middleware never touches the session store: an id without a stored
//! [`crate::auth::AuthSession`] is simply an unauthenticated visitor.

use axum::{
    body::Body,
    extract::Request,
    http::header::{COOKIE, SET_COOKIE},
    response::Response,
};
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

use crate::auth::SessionId;
use crate::config::SessionSettings;

/// Layer for session middleware
#[derive(Debug, Clone)]
pub struct SessionLayer {
    settings: Arc<SessionSettings>,
}

impl SessionLayer {
    /// Create a session layer from the session settings
    #[must_use]
    pub fn new(settings: &SessionSettings) -> Self {
        Self {
            settings: Arc::new(settings.clone()),
        }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            settings: self.settings.clone(),
        }
    }
}

/// Session middleware that handles cookie-based session ids
#[derive(Debug, Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    settings: Arc<SessionSettings>,
}

impl<S> Service<Request> for SessionMiddleware<S>
where
    S: Service<Request, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let settings = self.settings.clone();
        // Take the service that was driven to readiness, leave a clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let (session_id, is_new) = extract_session_id(&req, &settings.cookie_name)
                .map_or_else(|| (SessionId::generate(), true), |id| (id, false));

            req.extensions_mut().insert(session_id.clone());

            let mut response = inner.call(req).await?;

            if is_new {
                set_session_cookie(&mut response, &session_id, &settings);
            }

            Ok(response)
        })
    }
}

/// Extract session ID from request cookies
fn extract_session_id(req: &Request, cookie_name: &str) -> Option<SessionId> {
    let cookie_str = req.headers().get(COOKIE)?.to_str().ok()?;

    cookie_str
        .split(';')
        .filter_map(|cookie| cookie.trim().split_once('='))
        .find(|(name, _)| name.trim() == cookie_name)
        .and_then(|(_, value)| SessionId::from_str(value.trim()).ok())
}

/// Set session cookie on response
fn set_session_cookie(
    response: &mut Response<Body>,
    session_id: &SessionId,
    settings: &SessionSettings,
) {
    let mut cookie_value = format!(
        "{}={}; Path=/; Max-Age={}; SameSite={}; HttpOnly",
        settings.cookie_name,
        session_id.as_str(),
        settings.max_age_secs,
        settings.same_site.as_str()
    );

    if settings.secure_cookies {
        cookie_value.push_str("; Secure");
    }

    if let Ok(header_value) = cookie_value.parse() {
        response.headers_mut().append(SET_COOKIE, header_value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Extension, Router};
    use tower::ServiceExt;

    async fn echo(Extension(session_id): Extension<SessionId>) -> String {
        session_id.to_string()
    }

    fn app(settings: &SessionSettings) -> Router {
        Router::new()
            .route("/", get(echo))
            .layer(SessionLayer::new(settings))
    }

    async fn body_string(response: Response<Body>) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_new_visitor_gets_cookie() {
        let response = app(&SessionSettings::default())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let session_id = body_string(response).await;

        assert!(cookie.starts_with(&format!("multitwitch_session={session_id};")));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));
    }

    #[tokio::test]
    async fn test_existing_cookie_is_reused() {
        let id = "550e8400-e29b-41d4-a716-446655440000";
        let response = app(&SessionSettings::default())
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(COOKIE, format!("theme=dark; multitwitch_session={id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert!(response.headers().get(SET_COOKIE).is_none());
        assert_eq!(body_string(response).await, id);
    }

    #[tokio::test]
    async fn test_malformed_cookie_is_replaced() {
        let settings = SessionSettings {
            secure_cookies: true,
            ..SessionSettings::default()
        };
        let response = app(&settings)
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(COOKIE, "multitwitch_session=../../etc/passwd")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
        assert!(cookie.contains("; Secure"));
        assert_ne!(body_string(response).await, "../../etc/passwd");
    }
}
