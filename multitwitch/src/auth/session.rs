//! Session types and data structures
//!
//! An [`AuthSession`] is the per-browser record of where a visitor stands in
//! the OAuth2 flow. Its absence means the visitor is unauthenticated.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::oauth2::types::AccessCredential;

/// Unique session identifier carried in the session cookie
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a new random session ID
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from a string (validates format)
    ///
    /// # Errors
    ///
    /// Returns error if the string is not a valid UUID
    pub fn try_from_string(s: String) -> Result<Self, SessionError> {
        Uuid::parse_str(&s)
            .map(|_| Self(s))
            .map_err(|_| SessionError::InvalidSessionId)
    }

    /// Get the session ID as a string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from_string(s.to_string())
    }
}

/// Where a session stands in the OAuth2 flow
///
/// Pre-callback material (CSRF state, PKCE verifier) and the post-callback
/// credential never coexist: completing the flow consumes the former.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum AuthState {
    /// Redirected to the provider, waiting for the callback
    PendingCallback {
        /// CSRF state embedded in the authorization request
        csrf_state: String,
        /// PKCE verifier, when the provider uses PKCE
        pkce_verifier: Option<String>,
    },
    /// Callback completed and a credential was obtained
    Authenticated(AccessCredential),
}

/// Per-session OAuth2 record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    /// Provider this session is authenticating against
    pub provider: String,
    /// Flow phase
    pub state: AuthState,
    /// When this record was created
    pub created_at: DateTime<Utc>,
    /// When this record expires
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    /// Start a pending authorization for `provider`
    #[must_use]
    pub fn pending(
        provider: impl Into<String>,
        csrf_state: String,
        pkce_verifier: Option<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            provider: provider.into(),
            state: AuthState::PendingCallback {
                csrf_state,
                pkce_verifier,
            },
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Replace the pending state with a credential
    ///
    /// The expiry is reset to `ttl` from now.
    #[must_use]
    pub fn authenticate(self, credential: AccessCredential, ttl: Duration) -> Self {
        Self {
            state: AuthState::Authenticated(credential),
            expires_at: Utc::now() + ttl,
            ..self
        }
    }

    /// Check if the record has expired
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// The credential, if the flow completed
    #[must_use]
    pub const fn credential(&self) -> Option<&AccessCredential> {
        match &self.state {
            AuthState::Authenticated(credential) => Some(credential),
            AuthState::PendingCallback { .. } => None,
        }
    }

    /// Whether this session is authenticated against `provider`
    #[must_use]
    pub fn is_authenticated_for(&self, provider: &str) -> bool {
        self.provider == provider && self.credential().is_some()
    }
}

/// Session-related errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Invalid session ID format
    #[error("Invalid session ID")]
    InvalidSessionId,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backing store failure
    #[error("Session store error: {0}")]
    Store(String),
}
