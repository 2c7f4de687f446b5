//! Session state for the OAuth2 flow
//!
//! - [`session`]: session identifiers and the per-session flow record
//! - [`store`]: the storage capability and its in-memory implementation

pub mod session;
pub mod store;

pub use session::{AuthSession, AuthState, SessionError, SessionId};
pub use store::{MemorySessionStore, SessionLocks, SessionStore};
