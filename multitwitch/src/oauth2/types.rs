//! Core OAuth2 types and configuration
//!
//! This module defines the provider configuration, the credential a
//! completed flow produces, and the errors the flow can surface.

use chrono::{DateTime, Utc};
use oauth2::basic::BasicClient;
use oauth2::{EndpointNotSet, EndpointSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::auth::SessionError;

/// OAuth2 client with only the authorization endpoint configured
///
/// The token exchange is performed directly over HTTP (see
/// [`crate::oauth2::provider`]), so the token endpoint stays unset here.
pub type AuthorizeClient = BasicClient<
    EndpointSet,    // HasAuthUrl
    EndpointNotSet, // HasDeviceAuthUrl
    EndpointNotSet, // HasIntrospectionUrl
    EndpointNotSet, // HasRevocationUrl
    EndpointNotSet, // HasTokenUrl
>;

/// Name under which the Twitch provider is registered
pub const TWITCH: &str = "twitch";

/// Configuration for an OAuth2 provider
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Human-readable provider name for the login page
    pub display_name: String,
    /// OAuth2 client ID
    pub client_id: String,
    /// OAuth2 client secret
    pub client_secret: String,
    /// Redirect URI (callback URL)
    pub redirect_uri: String,
    /// OAuth2 scopes to request
    pub scopes: Vec<String>,
    /// Authorization endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// User profile endpoint
    pub userinfo_url: String,
    /// Send a PKCE challenge with the authorization request
    pub use_pkce: bool,
}

impl ProviderConfig {
    /// Twitch endpoints and scopes, with empty credentials
    #[must_use]
    pub fn twitch() -> Self {
        Self {
            display_name: "Twitch".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: String::new(),
            scopes: vec!["user:read:email".to_string()],
            auth_url: "https://id.twitch.tv/oauth2/authorize".to_string(),
            token_url: "https://id.twitch.tv/oauth2/token".to_string(),
            userinfo_url: "https://api.twitch.tv/helix/users".to_string(),
            use_pkce: false,
        }
    }

    /// Names of required fields that are empty
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("redirect_uri", &self.redirect_uri),
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("userinfo_url", &self.userinfo_url),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::twitch()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("display_name", &self.display_name)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .field("auth_url", &self.auth_url)
            .field("token_url", &self.token_url)
            .field("userinfo_url", &self.userinfo_url)
            .field("use_pkce", &self.use_pkce)
            .finish()
    }
}

/// Registered OAuth2 providers, keyed by provider name
///
/// Built once at startup and handed to the auth flow controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OAuthConfig {
    providers: BTreeMap<String, ProviderConfig>,
}

impl OAuthConfig {
    /// Create a configuration with no providers
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Register (or replace) a provider
    #[must_use]
    pub fn with_provider(mut self, name: impl Into<String>, config: ProviderConfig) -> Self {
        self.providers.insert(name.into(), config);
        self
    }

    /// Get configuration for a specific provider
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UnknownProvider`] if the provider is not configured
    pub fn get_provider(&self, name: &str) -> Result<&ProviderConfig, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::UnknownProvider(name.to_string()))
    }

    /// Check if a provider is configured
    #[must_use]
    pub fn is_provider_configured(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Providers in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderConfig)> {
        self.providers
            .iter()
            .map(|(name, config)| (name.as_str(), config))
    }

    /// Number of configured providers
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self::empty().with_provider(TWITCH, ProviderConfig::twitch())
    }
}

/// Access credential obtained by a completed OAuth2 flow
///
/// Owned by the session that produced it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCredential {
    /// Provider that issued the credential
    pub provider: String,
    /// Bearer access token
    pub access_token: String,
    /// Refresh token (if provided)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// When the access token expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Scopes granted
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Provider-specific user ID
    pub subject_id: String,
    /// Account name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Email address
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Display nickname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Avatar/profile picture URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Location
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Profile description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl std::fmt::Debug for AccessCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessCredential")
            .field("provider", &self.provider)
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("expires_at", &self.expires_at)
            .field("scopes", &self.scopes)
            .field("subject_id", &self.subject_id)
            .field("name", &self.name)
            .field("nickname", &self.nickname)
            .finish_non_exhaustive()
    }
}

/// OAuth2 callback query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code from provider
    pub code: Option<String>,
    /// CSRF state token
    pub state: Option<String>,
    /// Optional error from provider
    pub error: Option<String>,
    /// Optional error description
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Successful callback carrying `code` and `state`
    #[must_use]
    pub fn new(code: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            state: Some(state.into()),
            ..Self::default()
        }
    }
}

/// Where to send the browser next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectInstruction {
    /// Absolute or site-relative target URL
    pub location: String,
}

impl RedirectInstruction {
    /// Redirect to `location`
    #[must_use]
    pub fn to(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }
}

/// OAuth2 errors
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    /// Provider is not registered
    #[error("Unknown OAuth2 provider: {0}")]
    UnknownProvider(String),

    /// No pending authorization for this session and provider
    #[error("No pending OAuth2 authorization for provider {0}")]
    NoPendingAuthorization(String),

    /// State token mismatch (potential CSRF attack)
    #[error("OAuth2 state token mismatch (potential CSRF attack)")]
    StateMismatch,

    /// Callback carried no authorization code
    #[error("OAuth2 callback is missing the authorization code")]
    MissingAuthorizationCode,

    /// Provider reported an error on the callback
    #[error("OAuth2 provider returned an error: {error}")]
    ProviderDenied {
        /// Error code from the provider
        error: String,
        /// Human-readable description, if any
        description: Option<String>,
    },

    /// Authorization code exchange failed
    #[error("Failed to exchange authorization code for token: {0}")]
    TokenExchangeFailed(String),

    /// Provider answered with a body that could not be decoded
    #[error("Malformed response from OAuth2 provider: {0}")]
    MalformedProviderResponse(String),

    /// Failed to fetch user info
    #[error("Failed to fetch user information: {0}")]
    UserInfoFailed(String),

    /// Provider endpoint URL could not be parsed
    #[error("Invalid OAuth2 endpoint: {0}")]
    InvalidEndpoint(String),

    /// Session store failure
    #[error(transparent)]
    Session(#[from] SessionError),
}
