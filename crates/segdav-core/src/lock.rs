use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DavError, StoreError};

/// How long an issued token stays active unless released first.
pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(600);

/// An active lock as reported to the client.
#[derive(Debug, Clone)]
pub struct LockToken {
    /// Opaque, globally unique token string.
    pub token: String,
    pub resource_path: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// The persisted form of a lock, keyed by resource path in the backing
/// store. Timestamps are epoch seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub token: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl LockRecord {
    /// Whether this record still counts as held at `now` (epoch seconds).
    pub fn is_active(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Outcome of a release attempt. The wire status is 204 either way;
/// `NoSuchLock` exists so the miss can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    NoSuchLock,
}

/// Issues opaque token strings. Injectable so tests can pin tokens.
pub trait TokenSource: Send + Sync {
    fn issue(&self) -> String;
}

/// Production token source: random v4 UUIDs.
#[derive(Debug, Default, Clone)]
pub struct UuidTokenSource;

impl TokenSource for UuidTokenSource {
    fn issue(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Backing store for lock records, keyed by resource path.
///
/// `try_insert` is the serialization point: it must atomically refuse
/// when an active record already exists, so concurrent lockers cannot
/// both win. Expired records count as absent everywhere.
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Insert `record` only if no active record exists for `path`.
    /// Returns `false` (and leaves the existing record in place) when the
    /// path is already held.
    async fn try_insert(&self, path: &str, record: LockRecord) -> Result<bool, StoreError>;

    /// Insert `record` unconditionally, replacing any existing record.
    async fn put(&self, path: &str, record: LockRecord) -> Result<(), StoreError>;

    /// Remove the record for `path` if its token matches.
    async fn remove(&self, path: &str, token: &str) -> Result<ReleaseOutcome, StoreError>;
}

/// Lock acquisition policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// RFC-faithful: a second LOCK on a held path fails with 423.
    #[default]
    Exclusive,
    /// Relaxed: a second LOCK replaces the existing record and issues a
    /// fresh token. The one-active-token invariant still holds;
    /// exclusion does not.
    Permissive,
}

/// Issues and retires lock tokens for resource paths.
pub struct LockManager {
    store: Arc<dyn LockStore>,
    tokens: Arc<dyn TokenSource>,
    policy: LockPolicy,
    ttl: Duration,
}

impl LockManager {
    pub fn new(
        store: Arc<dyn LockStore>,
        tokens: Arc<dyn TokenSource>,
        policy: LockPolicy,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            tokens,
            policy,
            ttl,
        }
    }

    /// Acquire a lock on `path`.
    ///
    /// Under `LockPolicy::Exclusive` an already-held path fails with
    /// `DavError::Locked`; under `LockPolicy::Permissive` the prior
    /// record is replaced.
    pub async fn lock(&self, path: &str) -> Result<LockToken, DavError> {
        let issued_at = Utc::now();
        let expires_at = issued_at + self.ttl;
        let record = LockRecord {
            token: self.tokens.issue(),
            issued_at: issued_at.timestamp(),
            expires_at: expires_at.timestamp(),
        };
        let token = record.token.clone();

        match self.policy {
            LockPolicy::Exclusive => {
                if !self.store.try_insert(path, record).await? {
                    debug!("Lock refused, {} already held", path);
                    return Err(DavError::Locked(path.to_string()));
                }
            }
            LockPolicy::Permissive => {
                self.store.put(path, record).await?;
            }
        }

        debug!("Issued lock {} on {}", token, path);
        Ok(LockToken {
            token,
            resource_path: path.to_string(),
            issued_at,
            expires_at,
        })
    }

    /// Release the lock on `path`.
    ///
    /// Never errors: WebDAV clients unlock defensively and expect 204
    /// regardless. A missing or mismatched lock, or a store failure, is
    /// logged and reported as `NoSuchLock`.
    pub async fn unlock(&self, path: &str, token: &str) -> ReleaseOutcome {
        match self.store.remove(path, token).await {
            Ok(ReleaseOutcome::Released) => {
                debug!("Released lock {} on {}", token, path);
                ReleaseOutcome::Released
            }
            Ok(ReleaseOutcome::NoSuchLock) => {
                debug!("Unlock on {} without a matching lock (no-op)", path);
                ReleaseOutcome::NoSuchLock
            }
            Err(e) => {
                warn!("Unlock on {} failed in the backing store: {}", path, e);
                ReleaseOutcome::NoSuchLock
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Minimal in-process lock store for exercising the manager.
    #[derive(Default)]
    struct TestLockStore {
        records: Mutex<HashMap<String, LockRecord>>,
    }

    #[async_trait]
    impl LockStore for TestLockStore {
        async fn try_insert(&self, path: &str, record: LockRecord) -> Result<bool, StoreError> {
            let mut records = self.records.lock().unwrap();
            let now = Utc::now().timestamp();
            if records.get(path).is_some_and(|r| r.is_active(now)) {
                return Ok(false);
            }
            records.insert(path.to_string(), record);
            Ok(true)
        }

        async fn put(&self, path: &str, record: LockRecord) -> Result<(), StoreError> {
            self.records
                .lock()
                .unwrap()
                .insert(path.to_string(), record);
            Ok(())
        }

        async fn remove(&self, path: &str, token: &str) -> Result<ReleaseOutcome, StoreError> {
            let mut records = self.records.lock().unwrap();
            match records.get(path) {
                Some(r) if r.token == token => {
                    records.remove(path);
                    Ok(ReleaseOutcome::Released)
                }
                _ => Ok(ReleaseOutcome::NoSuchLock),
            }
        }
    }

    fn manager(policy: LockPolicy) -> LockManager {
        LockManager::new(
            Arc::new(TestLockStore::default()),
            Arc::new(UuidTokenSource),
            policy,
            DEFAULT_LOCK_TTL,
        )
    }

    #[tokio::test]
    async fn test_lock_then_unlock_round_trip() {
        let locks = manager(LockPolicy::Exclusive);

        let token = locks.lock("/readme.txt").await.unwrap();
        assert_eq!(token.resource_path, "/readme.txt");
        assert!(!token.token.is_empty());

        let outcome = locks.unlock("/readme.txt", &token.token).await;
        assert_eq!(outcome, ReleaseOutcome::Released);

        // Released, so a fresh lock succeeds.
        locks.lock("/readme.txt").await.unwrap();
    }

    #[tokio::test]
    async fn test_exclusive_refuses_second_lock() {
        let locks = manager(LockPolicy::Exclusive);

        locks.lock("/readme.txt").await.unwrap();
        let second = locks.lock("/readme.txt").await;
        assert!(matches!(second, Err(DavError::Locked(_))));
    }

    #[tokio::test]
    async fn test_permissive_reissues_token() {
        let locks = manager(LockPolicy::Permissive);

        let first = locks.lock("/readme.txt").await.unwrap();
        let second = locks.lock("/readme.txt").await.unwrap();
        assert_ne!(first.token, second.token);

        // The replaced token no longer releases anything.
        let stale = locks.unlock("/readme.txt", &first.token).await;
        assert_eq!(stale, ReleaseOutcome::NoSuchLock);
        let fresh = locks.unlock("/readme.txt", &second.token).await;
        assert_eq!(fresh, ReleaseOutcome::Released);
    }

    #[tokio::test]
    async fn test_unlock_is_idempotent() {
        let locks = manager(LockPolicy::Exclusive);

        let outcome = locks.unlock("/never-locked.txt", "no-such-token").await;
        assert_eq!(outcome, ReleaseOutcome::NoSuchLock);

        let token = locks.lock("/readme.txt").await.unwrap();
        locks.unlock("/readme.txt", &token.token).await;
        let again = locks.unlock("/readme.txt", &token.token).await;
        assert_eq!(again, ReleaseOutcome::NoSuchLock);
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_reacquired() {
        let locks = LockManager::new(
            Arc::new(TestLockStore::default()),
            Arc::new(UuidTokenSource),
            LockPolicy::Exclusive,
            Duration::ZERO,
        );

        locks.lock("/readme.txt").await.unwrap();
        // TTL of zero means the record is already expired.
        locks.lock("/readme.txt").await.unwrap();
    }

    #[test]
    fn test_uuid_tokens_are_unique() {
        let source = UuidTokenSource;
        assert_ne!(source.issue(), source.issue());
    }
}
