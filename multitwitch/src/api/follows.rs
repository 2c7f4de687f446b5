//! Twitch Helix follows client
//!
//! `GET {base_url}/users/follows?from_id=<subject>` with the session's
//! bearer token and the application's `Client-Id`. Every call goes to the
//! network; nothing is cached.

use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};

use crate::oauth2::provider::CLIENT_ID_HEADER;
use crate::oauth2::types::AccessCredential;

/// One follow relationship as returned by the API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// Follower user ID
    pub from_id: String,
    /// Follower login
    pub from_login: String,
    /// Follower display name
    pub from_name: String,
    /// Followed user ID
    pub to_id: String,
    /// Followed login
    pub to_login: String,
    /// Followed display name
    pub to_name: String,
    /// When the follow happened
    pub followed_at: DateTime<Utc>,
}

/// Decoded follows page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FollowListResult {
    /// Total number of follows reported by the API
    pub total: u64,
    /// Edges in API order
    pub edges: Vec<FollowEdge>,
    /// Cursor for the next page, if any
    pub cursor: Option<String>,
}

/// Downstream API errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Credential carries no access token
    #[error("No access credential available")]
    MissingCredential,

    /// Base URL could not be parsed
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// Network or transport failure
    #[error("Upstream API unreachable: {0}")]
    UpstreamUnreachable(String),

    /// Upstream answered with a non-200 status
    #[error("Upstream API rejected the request with status {status}")]
    UpstreamRejected {
        /// HTTP status code
        status: u16,
    },

    /// 200 response whose body could not be decoded
    #[error("Malformed upstream response: {0}")]
    MalformedUpstreamResponse(String),
}

#[derive(Deserialize)]
struct FollowsResponse {
    #[serde(deserialize_with = "lenient_total")]
    total: u64,
    data: Vec<FollowEdge>,
    #[serde(default)]
    pagination: Pagination,
}

#[derive(Default, Deserialize)]
struct Pagination {
    cursor: Option<String>,
}

/// `total` arrives either as a number or as a numeric string
fn lenient_total<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Total {
        Number(u64),
        Text(String),
    }

    match Total::deserialize(deserializer)? {
        Total::Number(total) => Ok(total),
        Total::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid total: {text:?}"))),
    }
}

/// Client for the follows endpoint
#[derive(Debug, Clone)]
pub struct FollowsClient {
    http_client: reqwest::Client,
    endpoint: reqwest::Url,
    client_id: String,
}

impl FollowsClient {
    /// Create a client for the API rooted at `base_url`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::InvalidBaseUrl`] if `base_url` does not parse
    pub fn new(
        http_client: reqwest::Client,
        base_url: &str,
        client_id: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let endpoint = format!("{}/users/follows", base_url.trim_end_matches('/'));
        let endpoint = reqwest::Url::parse(&endpoint)
            .map_err(|e| ApiError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        Ok(Self {
            http_client,
            endpoint,
            client_id: client_id.into(),
        })
    }

    /// Fetch the channels `subject_id` follows
    ///
    /// # Errors
    ///
    /// - [`ApiError::MissingCredential`] for an empty access token (no request is made)
    /// - [`ApiError::UpstreamUnreachable`] on transport failure
    /// - [`ApiError::UpstreamRejected`] on any status other than 200; the body is not read
    /// - [`ApiError::MalformedUpstreamResponse`] if a 200 body does not decode
    pub async fn fetch_follows(
        &self,
        credential: &AccessCredential,
        subject_id: &str,
    ) -> Result<FollowListResult, ApiError> {
        if credential.access_token.is_empty() {
            return Err(ApiError::MissingCredential);
        }

        let response = self
            .http_client
            .get(self.endpoint.clone())
            .query(&[("from_id", subject_id)])
            .bearer_auth(&credential.access_token)
            .header(CLIENT_ID_HEADER, &self.client_id)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Follows request failed");
                ApiError::UpstreamUnreachable(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            tracing::warn!(status = status.as_u16(), subject_id = %subject_id, "Follows request rejected");
            return Err(ApiError::UpstreamRejected {
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::UpstreamUnreachable(e.to_string()))?;

        let decoded: FollowsResponse = serde_json::from_slice(&body)
            .map_err(|e| ApiError::MalformedUpstreamResponse(e.to_string()))?;

        tracing::debug!(
            subject_id = %subject_id,
            total = decoded.total,
            edges = decoded.data.len(),
            "Fetched follows"
        );

        Ok(FollowListResult {
            total: decoded.total,
            edges: decoded.data,
            cursor: decoded.pagination.cursor.filter(|cursor| !cursor.is_empty()),
        })
    }
}
