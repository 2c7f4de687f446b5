//! multitwitch: sign in with Twitch and see who you follow
//!
//! The service runs the OAuth2 authorization code flow against Twitch,
//! keeps the resulting credential in a server-side session keyed by a
//! cookie, and uses it to call the Helix follows endpoint on the user's
//! behalf.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use multitwitch::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     config.validate()?;
//!
//!     let state = AppState::new(config)?;
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, multitwitch::app(state)).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Routes
//!
//! | Route | Behavior |
//! |---|---|
//! | `GET /` | provider list |
//! | `GET /auth/{provider}` | profile if logged in, otherwise redirect to the provider |
//! | `GET /auth/{provider}/callback` | complete the flow |
//! | `GET /logout/{provider}` | clear the session, redirect to `/` |
//! | `GET /display` | follows of the logged-in user |

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod oauth2;
pub mod observability;
pub mod state;
pub mod template;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::SessionLayer;
use crate::state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let session_layer = SessionLayer::new(&state.config().session);

    Router::new()
        .route("/", get(oauth2::handlers::index))
        .route("/auth/{provider}", get(oauth2::handlers::begin_or_show))
        .route("/auth/{provider}/callback", get(oauth2::handlers::callback))
        .route("/logout/{provider}", get(oauth2::handlers::logout))
        .route("/display", get(api::handlers::display))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub mod prelude {
    //! Convenience re-exports for common types
    //!
    //! ```rust
    //! use multitwitch::prelude::*;
    //! ```

    pub use crate::api::{ApiError, FollowEdge, FollowListResult, FollowsClient};
    pub use crate::auth::{MemorySessionStore, SessionId, SessionStore};
    pub use crate::config::AppConfig;
    pub use crate::error::MultitwitchError;
    pub use crate::extractors::SessionExtractor;
    pub use crate::middleware::SessionLayer;
    pub use crate::oauth2::{
        AccessCredential, AuthFlowController, CallbackParams, OAuthConfig, OAuthError,
        ProviderConfig, RedirectInstruction,
    };
    pub use crate::state::AppState;
}
