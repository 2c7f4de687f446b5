//! Session persistence
//!
//! [`SessionStore`] is the capability the auth flow needs from a session
//! backend. [`MemorySessionStore`] keeps records in process memory;
//! encrypted-cookie or external-cache backends plug in behind the same trait.
//!
//! Reads and writes on the store are individually atomic. Callers that need
//! a read-modify-write on one session hold that session's [`SessionLocks`]
//! guard for the duration.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use tokio::sync::OwnedMutexGuard;

use super::session::{AuthSession, SessionError, SessionId};

/// Storage backend for [`AuthSession`] records keyed by [`SessionId`]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Load a live session; expired records load as `None`
    async fn get(&self, id: &SessionId) -> Result<Option<AuthSession>, SessionError>;

    /// Insert or replace the session record
    async fn put(&self, id: &SessionId, session: AuthSession) -> Result<(), SessionError>;

    /// Delete the session record, if any
    async fn remove(&self, id: &SessionId) -> Result<(), SessionError>;
}

/// In-memory session store
///
/// Expired records are purged when read, and every `put` first sweeps the
/// records whose expiry has passed. Sessions that are started and never
/// come back therefore do not accumulate.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    sessions: HashMap<SessionId, AuthSession>,
    /// Min-heap of `(expires_at, id)`, one entry per insert
    expiry_queue: BinaryHeap<Reverse<(DateTime<Utc>, SessionId)>>,
}

impl StoreInner {
    fn insert(&mut self, id: &SessionId, session: AuthSession) {
        self.expiry_queue
            .push(Reverse((session.expires_at, id.clone())));
        self.sessions.insert(id.clone(), session);
    }

    /// Pop every queue entry due by `now` and drop the matching record
    /// unless it was re-inserted with a later expiry
    fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;

        while self
            .expiry_queue
            .peek()
            .is_some_and(|Reverse((expiry, _))| *expiry < now)
        {
            let Some(Reverse((_, id))) = self.expiry_queue.pop() else {
                break;
            };

            if self
                .sessions
                .get(&id)
                .is_some_and(|session| session.expires_at < now)
            {
                self.sessions.remove(&id);
                removed += 1;
            }
        }

        removed
    }
}

impl MemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held, including any that expired since
    /// the last sweep
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    /// Whether the store holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().sessions.is_empty()
    }

    /// Drop every expired record, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write();
        let removed = inner.sweep(Utc::now());

        if removed > 0 {
            tracing::debug!(
                removed,
                remaining = inner.sessions.len(),
                "Cleaned up expired sessions"
            );
        }

        removed
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<AuthSession>, SessionError> {
        let session = self.inner.read().sessions.get(id).cloned();

        match session {
            Some(session) if session.is_expired() => {
                tracing::debug!(session_id = %id, "Session expired");
                let mut inner = self.inner.write();
                // A concurrent put may have replaced it since the read
                if inner.sessions.get(id).is_some_and(AuthSession::is_expired) {
                    inner.sessions.remove(id);
                }
                Ok(None)
            }
            other => Ok(other),
        }
    }

    async fn put(&self, id: &SessionId, session: AuthSession) -> Result<(), SessionError> {
        let mut inner = self.inner.write();

        let swept = inner.sweep(Utc::now());
        if swept > 0 {
            tracing::debug!(swept, "Swept expired sessions");
        }

        inner.insert(id, session);
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<(), SessionError> {
        self.inner.write().sessions.remove(id);
        Ok(())
    }
}

/// Per-session async locks
///
/// Two requests for the same session id serialize; requests for different
/// ids never wait on each other. The outer map lock is only held while
/// looking up the per-session mutex.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<SessionId, Arc<tokio::sync::Mutex<()>>>>,
}

impl SessionLocks {
    /// Create an empty lock table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn acquire(&self, id: &SessionId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            // Entries nobody holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::time::Duration as StdDuration;

    fn pending(ttl: Duration) -> AuthSession {
        AuthSession::pending("twitch", "state".to_string(), None, ttl)
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();

        assert!(store.get(&id).await.unwrap().is_none());
        store.put(&id, pending(Duration::minutes(10))).await.unwrap();

        let loaded = store.get(&id).await.unwrap().unwrap();
        assert_eq!(loaded.provider, "twitch");
    }

    #[tokio::test]
    async fn test_expired_session_loads_as_none_and_is_purged() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        store.put(&id, pending(Duration::seconds(-1))).await.unwrap();

        assert!(store.get(&id).await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();
        store.put(&id, pending(Duration::minutes(10))).await.unwrap();

        store.remove(&id).await.unwrap();
        store.remove(&id).await.unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = MemorySessionStore::new();
        store
            .put(&SessionId::generate(), pending(Duration::milliseconds(10)))
            .await
            .unwrap();
        store
            .put(&SessionId::generate(), pending(Duration::minutes(10)))
            .await
            .unwrap();

        tokio::time::sleep(StdDuration::from_millis(30)).await;

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_put_sweeps_abandoned_sessions() {
        let store = MemorySessionStore::new();
        for _ in 0..1_000 {
            store
                .put(&SessionId::generate(), pending(Duration::seconds(-1)))
                .await
                .unwrap();
        }

        store
            .put(&SessionId::generate(), pending(Duration::minutes(10)))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_sweep_keeps_session_renewed_after_expiring_entry() {
        let store = MemorySessionStore::new();
        let id = SessionId::generate();

        store.put(&id, pending(Duration::milliseconds(10))).await.unwrap();
        store.put(&id, pending(Duration::minutes(10))).await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(30)).await;

        store
            .put(&SessionId::generate(), pending(Duration::minutes(10)))
            .await
            .unwrap();

        assert!(store.get(&id).await.unwrap().is_some());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_locks_serialize_same_session() {
        let locks = Arc::new(SessionLocks::new());
        let id = SessionId::generate();

        let guard = locks.acquire(&id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            let id = id.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
            })
        };

        tokio::time::sleep(StdDuration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_locks_do_not_block_other_sessions() {
        let locks = SessionLocks::new();
        let _first = locks.acquire(&SessionId::generate()).await;

        let second = tokio::time::timeout(
            StdDuration::from_millis(100),
            locks.acquire(&SessionId::generate()),
        )
        .await;

        assert!(second.is_ok());
    }
}
