//! Run-scoped identity cache for stored users.
//!
//! One cache is created per sync run and handed to the upsert layer, so
//! repeated lookups of the same author within a run skip the database.
//! Backed by `moka`; capacity is bounded and the cache picks what to evict.

use crate::model::User;
use moka::sync::Cache;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default number of users kept in memory during a run.
pub const DEFAULT_USER_CACHE_CAPACITY: usize = 10_000;

/// Bounded cache of users keyed by external id.
pub struct UserCache {
    capacity: u64,
    users: Cache<String, User>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl UserCache {
    /// Create a cache holding at most `capacity` users (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = u64::try_from(capacity.max(1)).unwrap_or(u64::MAX);
        Self {
            capacity,
            users: Cache::builder().max_capacity(capacity).build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a user, counting the hit or miss.
    pub fn get(&self, id: &str) -> Option<User> {
        let found = self.users.get(id);
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Insert or replace a user.
    pub fn insert(&self, user: User) {
        self.users.insert(user.id.clone(), user);
    }

    /// Number of cached users once pending evictions have been applied.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.users.run_pending_tasks();
        self.users.entry_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// (hits, misses) since creation.
    #[must_use]
    pub fn stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

impl Default for UserCache {
    fn default() -> Self {
        Self::new(DEFAULT_USER_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for UserCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (hits, misses) = self.stats();
        f.debug_struct("UserCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.users.entry_count())
            .field("hits", &hits)
            .field("misses", &misses)
            .finish()
    }
}
