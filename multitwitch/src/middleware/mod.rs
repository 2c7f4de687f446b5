//! Middleware
//!
//! - [`session`]: session cookie handling

pub mod session;

pub use session::{SessionLayer, SessionMiddleware};
