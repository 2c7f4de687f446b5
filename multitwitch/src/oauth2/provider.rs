//! OAuth2 provider client
//!
//! [`OAuthProvider`] wraps one [`ProviderConfig`]: it builds authorization
//! URLs (with CSRF state and optional PKCE), exchanges authorization codes
//! at the token endpoint, and loads the user's profile.
//!
//! The authorization URL comes from the `oauth2` crate. The token exchange
//! is a plain form POST because Twitch returns `scope` as a JSON array,
//! which the standard token response type rejects.

use chrono::{Duration, Utc};
use oauth2::url::Url;
use oauth2::{
    basic::BasicClient, AuthUrl, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    RedirectUrl, Scope,
};
use reqwest::header::ACCEPT;
use serde::Deserialize;

use crate::oauth2::http::body_snippet;
use crate::oauth2::types::{AccessCredential, AuthorizeClient, OAuthError, ProviderConfig};

/// Header carrying the application's client ID on provider API calls
pub const CLIENT_ID_HEADER: &str = "Client-Id";

/// An authorization request ready to send the browser to
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Provider authorization URL with the state embedded
    pub url: String,
    /// CSRF state token
    pub csrf_state: String,
    /// PKCE verifier (when the provider uses PKCE)
    pub pkce_verifier: Option<String>,
}

/// Tokens returned by the token endpoint
#[derive(Debug, Clone)]
pub struct TokenGrant {
    /// Access token
    pub access_token: String,
    /// Refresh token (if provided)
    pub refresh_token: Option<String>,
    /// Lifetime reported by the provider, in seconds
    pub expires_in: Option<i64>,
    /// Scopes granted
    pub scopes: Vec<String>,
}

/// Profile of the authenticated user
#[derive(Debug, Clone, Default)]
pub struct ProviderUser {
    /// Provider-specific user ID
    pub id: String,
    /// Account name
    pub login: String,
    /// Display name
    pub display_name: Option<String>,
    /// Email address
    pub email: Option<String>,
    /// Avatar URL
    pub avatar_url: Option<String>,
    /// Profile description
    pub description: Option<String>,
}

/// Client for one configured OAuth2 provider
pub struct OAuthProvider {
    name: String,
    config: ProviderConfig,
    client: AuthorizeClient,
    token_url: Url,
    userinfo_url: Url,
    http_client: reqwest::Client,
}

impl std::fmt::Debug for OAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthProvider")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OAuthProvider {
    /// Create a provider client
    ///
    /// # Errors
    ///
    /// Returns [`OAuthError::InvalidEndpoint`] if any configured URL is invalid
    pub fn new(
        name: impl Into<String>,
        config: &ProviderConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, OAuthError> {
        let client = BasicClient::new(ClientId::new(config.client_id.clone()))
            .set_client_secret(ClientSecret::new(config.client_secret.clone()))
            .set_auth_uri(
                AuthUrl::new(config.auth_url.clone())
                    .map_err(|e| OAuthError::InvalidEndpoint(format!("auth URL: {e}")))?,
            )
            .set_redirect_uri(
                RedirectUrl::new(config.redirect_uri.clone())
                    .map_err(|e| OAuthError::InvalidEndpoint(format!("redirect URI: {e}")))?,
            );

        let token_url = Url::parse(&config.token_url)
            .map_err(|e| OAuthError::InvalidEndpoint(format!("token URL: {e}")))?;
        let userinfo_url = Url::parse(&config.userinfo_url)
            .map_err(|e| OAuthError::InvalidEndpoint(format!("userinfo URL: {e}")))?;

        Ok(Self {
            name: name.into(),
            config: config.clone(),
            client,
            token_url,
            userinfo_url,
            http_client,
        })
    }

    /// Generate an authorization URL with a fresh CSRF state
    #[must_use]
    pub fn authorization_url(&self) -> AuthorizationRequest {
        let mut request = self.client.authorize_url(CsrfToken::new_random);

        for scope in &self.config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }

        let pkce_verifier = if self.config.use_pkce {
            let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
            request = request.set_pkce_challenge(pkce_challenge);
            Some(pkce_verifier.secret().clone())
        } else {
            None
        };

        let (auth_url, csrf_state) = request.url();

        AuthorizationRequest {
            url: auth_url.to_string(),
            csrf_state: csrf_state.secret().clone(),
            pkce_verifier,
        }
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    ///
    /// - [`OAuthError::TokenExchangeFailed`] on transport failure or a non-2xx status
    /// - [`OAuthError::MalformedProviderResponse`] if the body cannot be decoded
    pub async fn exchange_code(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<TokenGrant, OAuthError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];
        if let Some(verifier) = pkce_verifier {
            form.push(("code_verifier", verifier));
        }

        let response = self
            .http_client
            .post(self.token_url.clone())
            .header(ACCEPT, "application/json")
            .form(&form)
            .send()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OAuthError::TokenExchangeFailed(format!(
                "HTTP {status}: {}",
                body_snippet(&body, 200)
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::TokenExchangeFailed(e.to_string()))?;

        let token: TokenEndpointResponse = serde_json::from_slice(&body)
            .map_err(|e| OAuthError::MalformedProviderResponse(format!("token response: {e}")))?;

        if let Some(token_type) = token.token_type.as_deref() {
            if !token_type.eq_ignore_ascii_case("bearer") {
                return Err(OAuthError::MalformedProviderResponse(format!(
                    "unsupported token type: {token_type}"
                )));
            }
        }

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in: token.expires_in,
            scopes: token.scope.map(ScopeField::into_vec).unwrap_or_default(),
        })
    }

    /// Fetch the authenticated user's profile
    ///
    /// # Errors
    ///
    /// - [`OAuthError::UserInfoFailed`] on transport failure or a non-2xx status
    /// - [`OAuthError::MalformedProviderResponse`] if the body cannot be decoded
    pub async fn fetch_user(&self, access_token: &str) -> Result<ProviderUser, OAuthError> {
        let response = self
            .http_client
            .get(self.userinfo_url.clone())
            .bearer_auth(access_token)
            .header(CLIENT_ID_HEADER, &self.config.client_id)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfoFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(OAuthError::UserInfoFailed(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::UserInfoFailed(e.to_string()))?;

        let users: HelixUsers = serde_json::from_slice(&body)
            .map_err(|e| OAuthError::MalformedProviderResponse(format!("user response: {e}")))?;

        let user = users.data.into_iter().next().ok_or_else(|| {
            OAuthError::MalformedProviderResponse("user response has no entries".to_string())
        })?;

        Ok(ProviderUser {
            id: user.id,
            login: user.login,
            display_name: non_empty(user.display_name),
            email: non_empty(user.email),
            avatar_url: non_empty(user.profile_image_url),
            description: non_empty(user.description),
        })
    }

    /// Exchange the code and load the profile into a credential
    ///
    /// The Helix `/users` fetch is part of authentication: a token without
    /// a profile yields [`OAuthError::UserInfoFailed`], not a credential.
    ///
    /// # Errors
    ///
    /// Returns any error from [`Self::exchange_code`] or [`Self::fetch_user`]
    pub async fn authenticate(
        &self,
        code: &str,
        pkce_verifier: Option<&str>,
    ) -> Result<AccessCredential, OAuthError> {
        let token = self.exchange_code(code, pkce_verifier).await?;
        let user = self.fetch_user(&token.access_token).await?;

        Ok(AccessCredential {
            provider: self.name.clone(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token
                .expires_in
                .and_then(Duration::try_seconds)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl)),
            scopes: token.scopes,
            subject_id: user.id,
            name: Some(user.login),
            email: user.email,
            nickname: user.display_name,
            avatar_url: user.avatar_url,
            location: None,
            description: user.description,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<ScopeField>,
}

/// `scope` as either a JSON array or a space-delimited string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScopeField {
    List(Vec<String>),
    Delimited(String),
}

impl ScopeField {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::List(scopes) => scopes,
            Self::Delimited(scopes) => scopes.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Helix `GET /users` response
#[derive(Debug, Deserialize)]
struct HelixUsers {
    data: Vec<HelixUser>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
}
