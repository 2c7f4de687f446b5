//! Application state
//!
//! Cheap to clone; every field is shared behind an `Arc`.

use std::sync::Arc;

use crate::api::{ApiError, FollowsClient};
use crate::auth::{MemorySessionStore, SessionStore};
use crate::config::AppConfig;
use crate::oauth2::http::http_client;
use crate::oauth2::types::OAuthError;
use crate::oauth2::AuthFlowController;

/// Errors building the application state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Outbound HTTP client could not be created
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// OAuth2 provider setup failed
    #[error(transparent)]
    OAuth(#[from] OAuthError),

    /// Downstream API client setup failed
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Application state shared by all handlers
#[derive(Clone)]
pub struct AppState {
    config: Arc<AppConfig>,
    auth: Arc<AuthFlowController>,
    follows: Arc<FollowsClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("auth", &self.auth)
            .field("follows", &self.follows)
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Create state with an in-memory session store
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint URL in `config` is invalid
    pub fn new(config: AppConfig) -> Result<Self, StateError> {
        Self::with_store(config, Arc::new(MemorySessionStore::new()))
    }

    /// Create state backed by `store`
    ///
    /// # Errors
    ///
    /// Returns error if an endpoint URL in `config` is invalid
    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, StateError> {
        let http = http_client(&config.http)?;

        let auth = AuthFlowController::new(&config.oauth2, store, &http)?.with_ttls(
            config.session.pending_ttl(),
            config.session.max_age(),
        );

        let client_id = config
            .oauth2
            .get_provider(&config.api.provider)?
            .client_id
            .clone();
        let follows = FollowsClient::new(http, &config.api.base_url, client_id)?;

        Ok(Self {
            config: Arc::new(config),
            auth: Arc::new(auth),
            follows: Arc::new(follows),
        })
    }

    /// Get configuration reference
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The OAuth2 flow controller
    #[must_use]
    pub fn auth(&self) -> &AuthFlowController {
        &self.auth
    }

    /// The downstream follows client
    #[must_use]
    pub fn follows(&self) -> &FollowsClient {
        &self.follows
    }
}
