//! RFID tag handling ahead of the session registry: debounce of repeated
//! reads and a bounded cache in front of the tag directory.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use scandesk_core::{TagId, UserProfile};
use scandesk_storage::{StorageResult, TagResolver};
use tokio::time::Instant;
use tracing::{debug, trace};

/// Suppresses a tag presented again within `window` of its last accepted
/// read. Different tags never debounce each other.
#[derive(Debug)]
pub struct TagDebouncer {
    window: Duration,
    last_accepted: HashMap<TagId, DateTime<Utc>>,
}

impl TagDebouncer {
    /// A zero `window` disables debouncing.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    /// Returns `false` if `tag` was accepted less than `window` ago.
    pub fn should_accept(&mut self, tag: &TagId, now: DateTime<Utc>) -> bool {
        if self.window.is_zero() {
            return true;
        }

        let window = self.window;
        self.last_accepted.retain(|_, seen| elapsed(*seen, now) < window);

        if self.last_accepted.contains_key(tag) {
            debug!(tag = %tag, "tag debounced");
            return false;
        }
        self.last_accepted.insert(tag.clone(), now);
        true
    }
}

fn elapsed(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

struct CacheEntry {
    user: Option<UserProfile>,
    stored_at: Instant,
}

/// Time-bounded cache in front of a [`TagResolver`].
///
/// Unknown tags are cached too, so a stray badge does not hit the directory
/// on every read. Backend errors are passed through uncached. When full,
/// the oldest fifth of the entries is evicted.
pub struct CachedResolver<R> {
    inner: R,
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<TagId, CacheEntry>>,
}

impl<R: TagResolver> CachedResolver<R> {
    pub fn new(inner: R, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached lookup, e.g. after the directory was edited.
    pub fn invalidate(&self) {
        self.lock().clear();
    }

    fn cached(&self, tag: &TagId) -> Option<Option<UserProfile>> {
        let entries = self.lock();
        let entry = entries.get(tag)?;
        (entry.stored_at.elapsed() < self.ttl).then(|| entry.user.clone())
    }

    fn store(&self, tag: &TagId, user: Option<UserProfile>) {
        let mut entries = self.lock();
        let now = Instant::now();
        let ttl = self.ttl;
        entries.retain(|_, entry| now.duration_since(entry.stored_at) < ttl);

        if entries.len() >= self.capacity && !entries.contains_key(tag) {
            let evict = (self.capacity / 5).max(1);
            let mut by_age: Vec<(TagId, Instant)> = entries
                .iter()
                .map(|(tag, entry)| (tag.clone(), entry.stored_at))
                .collect();
            by_age.sort_by_key(|(_, stored_at)| *stored_at);
            for (old, _) in by_age.into_iter().take(evict) {
                entries.remove(&old);
            }
            trace!(evicted = evict, "resolver cache trimmed");
        }

        entries.insert(
            tag.clone(),
            CacheEntry {
                user,
                stored_at: now,
            },
        );
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TagId, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<R: TagResolver> TagResolver for CachedResolver<R> {
    async fn resolve(&self, tag: &TagId) -> StorageResult<Option<UserProfile>> {
        if let Some(hit) = self.cached(tag) {
            trace!(tag = %tag, found = hit.is_some(), "resolver cache hit");
            return Ok(hit);
        }
        let user = self.inner.resolve(tag).await?;
        self.store(tag, user.clone());
        Ok(user)
    }
}
