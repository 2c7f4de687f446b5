//! OAuth2 flow controller
//!
//! Per session the flow moves through
//! `Unauthenticated -> PendingCallback -> Authenticated`, and back to
//! `Unauthenticated` on logout or expiry. "Unauthenticated" is the absence
//! of a record in the [`SessionStore`].
//!
//! Every read-modify-write on a session runs under that session's lock, so
//! a duplicated callback waits for the first one and then finds the session
//! already authenticated instead of replaying a single-use code.

use chrono::Duration;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::auth::{AuthSession, AuthState, SessionId, SessionLocks, SessionStore};
use crate::oauth2::provider::OAuthProvider;
use crate::oauth2::types::{
    AccessCredential, CallbackParams, OAuthConfig, OAuthError, RedirectInstruction,
};

/// Default lifetime of a pending authorization (10 minutes)
pub const DEFAULT_PENDING_TTL_SECS: i64 = 600;

/// Default lifetime of an authenticated session (24 hours)
pub const DEFAULT_SESSION_TTL_SECS: i64 = 86_400;

/// Where logout sends the browser
pub const LOGOUT_LOCATION: &str = "/";

/// Compare the state returned on the callback with the stored one
///
/// Exact, case-sensitive match. An empty stored state never matches.
#[must_use]
pub fn states_match(stored: &str, returned: &str) -> bool {
    !stored.is_empty() && stored == returned
}

/// Orchestrates begin, complete and logout against the registered providers
pub struct AuthFlowController {
    providers: BTreeMap<String, OAuthProvider>,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    pending_ttl: Duration,
    session_ttl: Duration,
}

impl std::fmt::Debug for AuthFlowController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthFlowController")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("pending_ttl", &self.pending_ttl)
            .field("session_ttl", &self.session_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthFlowController {
    /// Create a controller for every provider in `config`
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidEndpoint`] if a provider URL is invalid
    pub fn new(
        config: &OAuthConfig,
        store: Arc<dyn SessionStore>,
        http_client: &reqwest::Client,
    ) -> Result<Self, OAuthError> {
        let providers = config
            .iter()
            .map(|(name, provider_config)| {
                OAuthProvider::new(name, provider_config, http_client.clone())
                    .map(|provider| (name.to_string(), provider))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self {
            providers,
            store,
            locks: SessionLocks::new(),
            pending_ttl: Duration::seconds(DEFAULT_PENDING_TTL_SECS),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
        })
    }

    /// Override how long pending and authenticated sessions live
    #[must_use]
    pub fn with_ttls(mut self, pending_ttl: Duration, session_ttl: Duration) -> Self {
        self.pending_ttl = pending_ttl;
        self.session_ttl = session_ttl;
        self
    }

    /// Look up a registered provider
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UnknownProvider`] if `name` is not registered
    pub fn provider(&self, name: &str) -> Result<&OAuthProvider, OAuthError> {
        self.providers
            .get(name)
            .ok_or_else(|| OAuthError::UnknownProvider(name.to_string()))
    }

    /// The session's credential, if it is authenticated against `provider`
    pub async fn authenticated_credential(
        &self,
        session_id: &SessionId,
        provider: &str,
    ) -> Result<Option<AccessCredential>, OAuthError> {
        Ok(self
            .store
            .get(session_id)
            .await?
            .filter(|session| session.is_authenticated_for(provider))
            .and_then(|session| session.credential().cloned()))
    }

    /// The session's credential, whichever provider issued it
    pub async fn session_credential(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<AccessCredential>, OAuthError> {
        Ok(self
            .store
            .get(session_id)
            .await?
            .and_then(|session| session.credential().cloned()))
    }

    /// Start the authorization code flow
    ///
    /// Generates a fresh CSRF state (and PKCE verifier when the provider
    /// uses one), stores it as the session's pending authorization and
    /// returns the provider redirect.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::UnknownProvider`] without touching the session
    /// store if the provider is not registered.
    pub async fn begin(
        &self,
        session_id: &SessionId,
        provider_name: &str,
    ) -> Result<RedirectInstruction, OAuthError> {
        let provider = self.provider(provider_name)?;
        let request = provider.authorization_url();

        let _guard = self.locks.acquire(session_id).await;
        self.store
            .put(
                session_id,
                AuthSession::pending(
                    provider_name,
                    request.csrf_state,
                    request.pkce_verifier,
                    self.pending_ttl,
                ),
            )
            .await?;

        tracing::debug!(
            provider = %provider_name,
            session_id = %session_id,
            "Started OAuth2 authorization"
        );

        Ok(RedirectInstruction::to(request.url))
    }

    /// Complete the flow from the provider callback
    ///
    /// If the session is already authenticated against `provider_name`, the
    /// stored credential is returned without another token exchange.
    /// Completion covers both the token exchange and the Helix profile
    /// fetch; a token endpoint that succeeds while `/users` fails still
    /// ends in [`OAuthError::UserInfoFailed`].
    ///
    /// # Errors
    ///
    /// - [`OAuthError::UnknownProvider`] for an unregistered provider
    /// - [`OAuthError::NoPendingAuthorization`] when the session has no live
    ///   authorization for this provider
    /// - [`OAuthError::StateMismatch`] when the returned state differs from the stored one
    /// - [`OAuthError::ProviderDenied`] when the provider reported an error
    /// - [`OAuthError::MissingAuthorizationCode`] when the callback has no code
    /// - any error from the token exchange or profile fetch
    pub async fn complete(
        &self,
        session_id: &SessionId,
        provider_name: &str,
        params: &CallbackParams,
    ) -> Result<AccessCredential, OAuthError> {
        let provider = self.provider(provider_name)?;

        let _guard = self.locks.acquire(session_id).await;

        let session = self
            .store
            .get(session_id)
            .await?
            .filter(|session| session.provider == provider_name)
            .ok_or_else(|| {
                tracing::warn!(
                    provider = %provider_name,
                    session_id = %session_id,
                    "OAuth2 callback without a pending authorization"
                );
                OAuthError::NoPendingAuthorization(provider_name.to_string())
            })?;

        let (csrf_state, pkce_verifier) = match &session.state {
            AuthState::Authenticated(credential) => {
                tracing::debug!(
                    provider = %provider_name,
                    session_id = %session_id,
                    "Session already authenticated, reusing credential"
                );
                return Ok(credential.clone());
            }
            AuthState::PendingCallback {
                csrf_state,
                pkce_verifier,
            } => (csrf_state.clone(), pkce_verifier.clone()),
        };

        if !states_match(&csrf_state, params.state.as_deref().unwrap_or_default()) {
            tracing::warn!(
                provider = %provider_name,
                session_id = %session_id,
                "OAuth2 state mismatch (potential CSRF attack)"
            );
            return Err(OAuthError::StateMismatch);
        }

        if let Some(error) = &params.error {
            tracing::warn!(
                provider = %provider_name,
                error = %error,
                description = params.error_description.as_deref().unwrap_or_default(),
                "OAuth2 error from provider"
            );
            return Err(OAuthError::ProviderDenied {
                error: error.clone(),
                description: params.error_description.clone(),
            });
        }

        let code = params
            .code
            .as_deref()
            .filter(|code| !code.is_empty())
            .ok_or(OAuthError::MissingAuthorizationCode)?;

        let credential = provider
            .authenticate(code, pkce_verifier.as_deref())
            .await?;

        self.store
            .put(
                session_id,
                session.authenticate(credential.clone(), self.session_ttl),
            )
            .await?;

        tracing::info!(
            provider = %provider_name,
            subject_id = %credential.subject_id,
            "User authenticated via OAuth2"
        );

        Ok(credential)
    }

    /// Forget the session's credential and any pending authorization
    ///
    /// Succeeds whether or not the session was authenticated.
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::Session`] only if the store itself fails
    pub async fn logout(
        &self,
        session_id: &SessionId,
        provider_name: &str,
    ) -> Result<RedirectInstruction, OAuthError> {
        let _guard = self.locks.acquire(session_id).await;

        if self.store.get(session_id).await?.is_some() {
            self.store.remove(session_id).await?;
            tracing::info!(provider = %provider_name, session_id = %session_id, "Logged out");
        } else {
            tracing::debug!(session_id = %session_id, "Logout without a session");
        }

        Ok(RedirectInstruction::to(LOGOUT_LOCATION))
    }
}
