//! Error types and HTTP error mapping
//!
//! Every failure is surfaced to the request that triggered it as a
//! rendered error page. None of them affects other requests.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::api::ApiError;
use crate::auth::SessionError;
use crate::config::ConfigError;
use crate::oauth2::types::OAuthError;
use crate::template::{ErrorPage, PageTemplate};

/// Application error type
#[derive(Debug, Error)]
pub enum MultitwitchError {
    /// OAuth2 flow error
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Downstream API error
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session store error
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Template rendering error
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Request needs a logged-in session
    #[error("Not logged in")]
    NotAuthenticated,
}

impl MultitwitchError {
    /// HTTP status for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::OAuth(err) => match err {
                OAuthError::UnknownProvider(_) => StatusCode::NOT_FOUND,
                OAuthError::StateMismatch
                | OAuthError::NoPendingAuthorization(_)
                | OAuthError::MissingAuthorizationCode
                | OAuthError::ProviderDenied { .. } => StatusCode::BAD_REQUEST,
                OAuthError::TokenExchangeFailed(_)
                | OAuthError::MalformedProviderResponse(_)
                | OAuthError::UserInfoFailed(_) => StatusCode::BAD_GATEWAY,
                OAuthError::InvalidEndpoint(_) | OAuthError::Session(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Api(err) => match err {
                ApiError::MissingCredential => StatusCode::UNAUTHORIZED,
                ApiError::UpstreamUnreachable(_)
                | ApiError::UpstreamRejected { .. }
                | ApiError::MalformedUpstreamResponse(_) => StatusCode::BAD_GATEWAY,
                ApiError::InvalidBaseUrl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotAuthenticated => StatusCode::UNAUTHORIZED,
            Self::Config(_) | Self::Session(_) | Self::Template(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the user
    ///
    /// Internal failures are not described beyond their status.
    #[must_use]
    pub fn public_message(&self) -> String {
        if self.status_code() == StatusCode::INTERNAL_SERVER_ERROR {
            "Something went wrong on our side. Please try again.".to_string()
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for MultitwitchError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %self, "Request rejected");
        }

        ErrorPage::new(status, self.public_message()).render_with_status(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_status_mapping() {
        let cases = [
            (OAuthError::UnknownProvider("x".into()), StatusCode::NOT_FOUND),
            (OAuthError::StateMismatch, StatusCode::BAD_REQUEST),
            (
                OAuthError::NoPendingAuthorization("twitch".into()),
                StatusCode::BAD_REQUEST,
            ),
            (OAuthError::MissingAuthorizationCode, StatusCode::BAD_REQUEST),
            (
                OAuthError::TokenExchangeFailed("HTTP 400".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                OAuthError::MalformedProviderResponse("eof".into()),
                StatusCode::BAD_GATEWAY,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(MultitwitchError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_api_status_mapping() {
        assert_eq!(
            MultitwitchError::from(ApiError::UpstreamRejected { status: 401 }).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            MultitwitchError::from(ApiError::UpstreamUnreachable("refused".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            MultitwitchError::NotAuthenticated.status_code(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_errors_are_not_described() {
        let err = MultitwitchError::from(SessionError::Store("disk on fire".into()));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.public_message().contains("disk on fire"));
    }

    #[test]
    fn test_into_response_uses_status() {
        let response = MultitwitchError::from(OAuthError::StateMismatch).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
