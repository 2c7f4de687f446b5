//! OAuth2 HTTP handlers
//!
//! - `GET /`: list the providers to log in with
//! - `GET /auth/{provider}`: show the profile if already logged in, otherwise begin
//! - `GET /auth/{provider}/callback`: complete the flow
//! - `GET /logout/{provider}`: forget the session and go home

use axum::{
    extract::{Path, Query, State},
    response::{Html, IntoResponse, Redirect, Response},
};

use crate::error::MultitwitchError;
use crate::extractors::SessionExtractor;
use crate::oauth2::types::CallbackParams;
use crate::state::AppState;
use crate::template::{IndexPage, PageTemplate, UserPage};

/// Show the user page, or redirect to the provider to log in
///
/// The authenticated check is explicit; a failed lookup is never used to
/// decide whether to begin.
///
/// # Errors
///
/// Returns error if the provider is unknown or the session store fails
pub async fn begin_or_show(
    State(state): State<AppState>,
    SessionExtractor(session_id): SessionExtractor,
    Path(provider): Path<String>,
) -> Result<Response, MultitwitchError> {
    if let Some(credential) = state
        .auth()
        .authenticated_credential(&session_id, &provider)
        .await?
    {
        return Ok(UserPage::from(&credential).to_html()?.into_response());
    }

    let redirect = state.auth().begin(&session_id, &provider).await?;
    Ok(Redirect::temporary(&redirect.location).into_response())
}

/// Handle the provider callback
///
/// # Errors
///
/// Returns error on state mismatch, provider denial, or a failed token
/// exchange or profile fetch
pub async fn callback(
    State(state): State<AppState>,
    SessionExtractor(session_id): SessionExtractor,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Result<Html<String>, MultitwitchError> {
    let credential = state
        .auth()
        .complete(&session_id, &provider, &params)
        .await?;

    Ok(UserPage::from(&credential).to_html()?)
}

/// Log out and return to the landing page
///
/// # Errors
///
/// Returns error only if the session store fails
pub async fn logout(
    State(state): State<AppState>,
    SessionExtractor(session_id): SessionExtractor,
    Path(provider): Path<String>,
) -> Result<Redirect, MultitwitchError> {
    let redirect = state.auth().logout(&session_id, &provider).await?;
    Ok(Redirect::temporary(&redirect.location))
}

/// Landing page with a login link per provider
///
/// # Errors
///
/// Returns error if the page fails to render
pub async fn index(State(state): State<AppState>) -> Result<Html<String>, MultitwitchError> {
    Ok(IndexPage::from_config(&state.config().oauth2).to_html()?)
}
