//! Askama page templates
//!
//! Templates live in `multitwitch/templates/` and extend `base.html`. View
//! structs hold display-ready strings so templates stay free of logic
//! beyond emptiness checks. All output is HTML-escaped.

use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

use crate::api::FollowListResult;
use crate::oauth2::types::{AccessCredential, OAuthConfig};

/// Extension trait for rendering page templates as axum responses
pub trait PageTemplate: Template {
    /// Render into an HTML body
    ///
    /// # Errors
    ///
    /// Returns `askama::Error` if rendering fails
    fn to_html(&self) -> askama::Result<Html<String>> {
        self.render().map(Html)
    }

    /// Render as a response with the given status
    ///
    /// Falls back to a plain-text 500 if rendering fails.
    fn render_with_status(&self, status: StatusCode) -> Response {
        match self.render() {
            Ok(html) => (status, Html(html)).into_response(),
            Err(err) => {
                tracing::error!("Template rendering error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Template rendering failed",
                )
                    .into_response()
            }
        }
    }
}

impl<T: Template> PageTemplate for T {}

/// Login link for one provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderLink {
    /// Route segment (`/auth/{name}`)
    pub name: String,
    /// Label shown to the user
    pub display_name: String,
}

/// Landing page listing the configured providers
#[derive(Debug, Template)]
#[template(path = "index.html")]
pub struct IndexPage {
    /// Providers in name order
    pub providers: Vec<ProviderLink>,
}

impl IndexPage {
    /// Build the provider list from configuration
    #[must_use]
    pub fn from_config(config: &OAuthConfig) -> Self {
        let providers = config
            .iter()
            .map(|(name, provider)| ProviderLink {
                name: name.to_string(),
                display_name: if provider.display_name.is_empty() {
                    name.to_string()
                } else {
                    provider.display_name.clone()
                },
            })
            .collect();

        Self { providers }
    }
}

/// Profile page for an authenticated session
///
/// Tokens are never rendered.
#[derive(Debug, Template)]
#[template(path = "user.html")]
pub struct UserPage {
    /// Provider the user signed in with
    pub provider: String,
    /// Provider user ID
    pub subject_id: String,
    /// Account name
    pub name: String,
    /// Email address, empty if not shared
    pub email: String,
    /// Display name
    pub nickname: String,
    /// Location
    pub location: String,
    /// Profile picture URL
    pub avatar_url: String,
    /// Profile description
    pub description: String,
    /// Granted scopes, space separated
    pub scopes: String,
    /// Token expiry in RFC 3339, empty if unknown
    pub expires_at: String,
}

impl From<&AccessCredential> for UserPage {
    fn from(credential: &AccessCredential) -> Self {
        let text = |value: &Option<String>| value.clone().unwrap_or_default();

        Self {
            provider: credential.provider.clone(),
            subject_id: credential.subject_id.clone(),
            name: text(&credential.name),
            email: text(&credential.email),
            nickname: text(&credential.nickname),
            location: text(&credential.location),
            avatar_url: text(&credential.avatar_url),
            description: text(&credential.description),
            scopes: credential.scopes.join(" "),
            expires_at: credential
                .expires_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default(),
        }
    }
}

/// One row of the follows page
#[derive(Debug, Clone)]
pub struct FollowRow {
    /// Login of the followed channel
    pub to_login: String,
    /// Display name of the followed channel
    pub to_name: String,
    /// Follow date as `YYYY-MM-DD`
    pub followed_at: String,
}

/// Follow list for the session's user
#[derive(Debug, Template)]
#[template(path = "follows.html")]
pub struct FollowsPage {
    /// Whose follows are listed
    pub subject_name: String,
    /// Total follow count reported upstream
    pub total: u64,
    /// Rows on this page
    pub edges: Vec<FollowRow>,
    /// Cursor for the next page, empty on the last one
    pub cursor: String,
}

impl FollowsPage {
    /// Build the page for `subject_name` from an API result
    #[must_use]
    pub fn new(subject_name: impl Into<String>, result: &FollowListResult) -> Self {
        Self {
            subject_name: subject_name.into(),
            total: result.total,
            edges: result
                .edges
                .iter()
                .map(|edge| FollowRow {
                    to_login: edge.to_login.clone(),
                    to_name: edge.to_name.clone(),
                    followed_at: edge.followed_at.format("%Y-%m-%d").to_string(),
                })
                .collect(),
            cursor: result.cursor.clone().unwrap_or_default(),
        }
    }
}

/// Error page
#[derive(Debug, Template)]
#[template(path = "error.html")]
pub struct ErrorPage {
    /// HTTP status code
    pub status: u16,
    /// Canonical reason phrase for the status
    pub reason: String,
    /// Message shown to the user
    pub message: String,
}

impl ErrorPage {
    /// Error page for `status` showing `message`
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            message: message.into(),
        }
    }
}
