//! Downstream API HTTP handlers

use axum::{extract::State, response::Html};

use crate::error::MultitwitchError;
use crate::extractors::SessionExtractor;
use crate::state::AppState;
use crate::template::{FollowsPage, PageTemplate};

/// Show the channels the logged-in user follows
///
/// # Errors
///
/// Returns [`MultitwitchError::NotAuthenticated`] if the session holds no
/// credential, or the downstream API error if the fetch fails.
pub async fn display(
    State(state): State<AppState>,
    SessionExtractor(session_id): SessionExtractor,
) -> Result<Html<String>, MultitwitchError> {
    let credential = state
        .auth()
        .session_credential(&session_id)
        .await?
        .ok_or(MultitwitchError::NotAuthenticated)?;

    let result = state
        .follows()
        .fetch_follows(&credential, &credential.subject_id)
        .await?;

    let subject_name = credential
        .nickname
        .as_deref()
        .or(credential.name.as_deref())
        .unwrap_or(&credential.subject_id);

    Ok(FollowsPage::new(subject_name, &result).to_html()?)
}
