//! Downstream REST API
//!
//! - [`follows`]: the credentialed follows client
//! - [`handlers`]: the `/display` route

pub mod follows;
pub mod handlers;

pub use follows::{ApiError, FollowEdge, FollowListResult, FollowsClient};
