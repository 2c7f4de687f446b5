//! OAuth2 authentication
//!
//! - [`types`]: provider configuration, credentials and errors
//! - [`http`]: the shared outbound HTTP client
//! - [`provider`]: authorization URL, token exchange and profile fetch
//! - [`flow`]: the per-session flow controller
//! - [`handlers`]: axum routes for the flow

pub mod flow;
pub mod handlers;
pub mod http;
pub mod provider;
pub mod types;

pub use flow::AuthFlowController;
pub use provider::OAuthProvider;
pub use types::{
    AccessCredential, CallbackParams, OAuthConfig, OAuthError, ProviderConfig,
    RedirectInstruction,
};
