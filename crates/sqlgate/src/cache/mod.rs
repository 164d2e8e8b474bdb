//! Compiled statement cache.
//!
//! Keyed by `(fingerprint, dialect)`. Concurrent misses on the same key are
//! collapsed: one caller compiles while the others wait on a `watch` channel
//! registered under the key and receive the same result. Capacity is
//! enforced with LRU eviction on a logical clock; TTL expiry is checked
//! lazily on lookup and optionally by a background sweeper.


use crate::ast::Fingerprint;
use crate::compile::{CompiledSql, ParamSlot};
use crate::dialect::Dialect;
use crate::error::{CacheError, CompileError};
use crate::validate::ResolvedColumn;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// A compiled statement as stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedStatement {
    fingerprint: Fingerprint,
    dialect: Dialect,
    sql: String,
    slots: Vec<ParamSlot>,
    columns: Vec<ResolvedColumn>,
    schema_generation: u64,
    created_at: DateTime<Utc>,
}

impl CachedStatement {
    pub fn new(fingerprint: Fingerprint, compiled: CompiledSql) -> Self {
        Self {
            fingerprint,
            dialect: compiled.dialect,
            sql: compiled.sql,
            slots: compiled.slots,
            columns: compiled.columns,
            schema_generation: compiled.schema_generation,
            created_at: Utc::now(),
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    pub fn columns(&self) -> &[ResolvedColumn] {
        &self.columns
    }

    /// Generation of the schema registry this statement was compiled against.
    pub fn schema_generation(&self) -> u64 {
        self.schema_generation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether executing this statement yields a result set (SELECT, or
    /// RETURNING on a mutation).
    pub fn returns_rows(&self) -> bool {
        !self.columns.is_empty()
    }
}

/// Statement cache configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementCacheConfig {
    /// Maximum number of compiled statements kept.
    pub capacity: usize,
    /// Entries older than this are treated as absent. `None` disables expiry.
    pub ttl: Option<Duration>,
}

impl Default for StatementCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            ttl: None,
        }
    }
}

/// Statement cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Compilations run by this cache (one per collapsed group of misses).
    pub compiles: u64,
    /// Entries removed to stay within capacity.
    pub evictions: u64,
    /// Entries removed because their TTL elapsed.
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Returns the cache hit ratio (0.0 to 1.0).
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

type CacheKey = (Fingerprint, Dialect);
type Outcome = Result<Arc<CachedStatement>, CompileError>;

#[derive(Debug)]
struct Entry {
    stmt: Arc<CachedStatement>,
    inserted: Instant,
    last_used_tick: u64,
    created_tick: u64,
}

#[derive(Debug)]
enum Slot {
    Ready(Entry),
    Pending {
        id: u64,
        rx: watch::Receiver<Option<Outcome>>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    slots: HashMap<CacheKey, Slot>,
    tick: u64,
    next_pending: u64,
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn ready_len(&self) -> usize {
        self.slots
            .values()
            .filter(|s| matches!(s, Slot::Ready(_)))
            .count()
    }

    fn touch(&mut self, key: &CacheKey) -> Option<Arc<CachedStatement>> {
        let tick = self.next_tick();
        match self.slots.get_mut(key) {
            Some(Slot::Ready(entry)) => {
                entry.last_used_tick = tick;
                Some(Arc::clone(&entry.stmt))
            }
            _ => None,
        }
    }

    fn expired_keys(&self, ttl: Option<Duration>, now: Instant) -> Vec<CacheKey> {
        self.slots
            .iter()
            .filter(|(_, s)| matches!(s, Slot::Ready(e) if is_expired(e, ttl, now)))
            .map(|(k, _)| *k)
            .collect()
    }

    fn least_recently_used(&self) -> Option<CacheKey> {
        self.slots
            .iter()
            .filter_map(|(k, s)| match s {
                Slot::Ready(e) => Some((k, (e.last_used_tick, e.created_tick))),
                Slot::Pending { .. } => None,
            })
            .min_by_key(|(_, order)| *order)
            .map(|(k, _)| *k)
    }
}

fn is_expired(entry: &Entry, ttl: Option<Duration>, now: Instant) -> bool {
    ttl.is_some_and(|ttl| now.saturating_duration_since(entry.inserted) > ttl)
}

enum Probe {
    Ready,
    Expired,
    Stale,
    Pending(watch::Receiver<Option<Outcome>>),
    Vacant,
}

/// Memoizes compiled statements. Share it behind an `Arc`.
#[derive(Debug)]
pub struct StatementCache {
    config: StatementCacheConfig,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
    compiles: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl StatementCache {
    pub fn new(config: StatementCacheConfig) -> Result<Self, CacheError> {
        if config.capacity == 0 {
            return Err(CacheError::InvalidCapacity);
        }
        if config.ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidTtl);
        }
        Ok(Self {
            config,
            inner: Mutex::new(Inner::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            compiles: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &StatementCacheConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached statement for the key, compiling it on a miss.
    ///
    /// Only one caller per key runs `compile`; concurrent callers wait for
    /// its result. A failed compilation is returned to every waiter and is
    /// not cached. If the compiling caller panics, waiters retry.
    pub async fn get_or_compile<F>(
        &self,
        fingerprint: Fingerprint,
        dialect: Dialect,
        compile: F,
    ) -> Result<Arc<CachedStatement>, CompileError>
    where
        F: FnOnce() -> Result<CompiledSql, CompileError>,
    {
        self.lookup(fingerprint, dialect, None, compile).await
    }

    /// Like [`get_or_compile`](Self::get_or_compile), for a statement
    /// validated against schema `generation`.
    ///
    /// An entry compiled against another generation is a miss and is
    /// replaced; so is a shared in-flight result from another generation.
    pub async fn get_or_compile_at<F>(
        &self,
        fingerprint: Fingerprint,
        dialect: Dialect,
        generation: u64,
        compile: F,
    ) -> Result<Arc<CachedStatement>, CompileError>
    where
        F: FnOnce() -> Result<CompiledSql, CompileError>,
    {
        self.lookup(fingerprint, dialect, Some(generation), compile)
            .await
    }

    async fn lookup<F>(
        &self,
        fingerprint: Fingerprint,
        dialect: Dialect,
        generation: Option<u64>,
        compile: F,
    ) -> Result<Arc<CachedStatement>, CompileError>
    where
        F: FnOnce() -> Result<CompiledSql, CompileError>,
    {
        let key = (fingerprint, dialect);
        let current = |stmt: &CachedStatement| {
            generation.is_none_or(|g| stmt.schema_generation() == g)
        };
        let mut counted = false;

        let (id, tx) = loop {
            let mut rx = {
                let now = Instant::now();
                let mut inner = self.lock();
                let probe = match inner.slots.get(&key) {
                    Some(Slot::Ready(e)) if is_expired(e, self.config.ttl, now) => Probe::Expired,
                    Some(Slot::Ready(e)) if !current(&e.stmt) => Probe::Stale,
                    Some(Slot::Ready(_)) => Probe::Ready,
                    Some(Slot::Pending { rx, .. }) => Probe::Pending(rx.clone()),
                    None => Probe::Vacant,
                };

                let expired = matches!(probe, Probe::Expired);
                match probe {
                    Probe::Ready => {
                        if let Some(stmt) = inner.touch(&key) {
                            self.hits.fetch_add(1, Ordering::Relaxed);
                            tracing::trace!(target: "sqlgate.cache", %fingerprint, %dialect, "hit");
                            return Ok(stmt);
                        }
                        continue;
                    }
                    Probe::Pending(rx) => {
                        if !counted {
                            counted = true;
                            self.misses.fetch_add(1, Ordering::Relaxed);
                        }
                        rx
                    }
                    Probe::Expired | Probe::Stale | Probe::Vacant => {
                        if expired {
                            inner.slots.remove(&key);
                            self.expirations.fetch_add(1, Ordering::Relaxed);
                            tracing::debug!(target: "sqlgate.cache", %fingerprint, %dialect, "expired");
                        } else if inner.slots.remove(&key).is_some() {
                            tracing::debug!(
                                target: "sqlgate.cache",
                                %fingerprint,
                                %dialect,
                                "compiled against another schema generation"
                            );
                        }
                        if !counted {
                            self.misses.fetch_add(1, Ordering::Relaxed);
                        }
                        inner.next_pending += 1;
                        let id = inner.next_pending;
                        let (tx, rx) = watch::channel(None);
                        inner.slots.insert(key, Slot::Pending { id, rx });
                        break (id, tx);
                    }
                }
            };

            tracing::trace!(target: "sqlgate.cache", %fingerprint, %dialect, "waiting for in-flight compile");
            // Err means the compiling caller went away without a result.
            if let Ok(outcome) = rx.wait_for(Option::is_some).await {
                match outcome.clone() {
                    Some(Ok(stmt)) if !current(&stmt) => {}
                    Some(outcome) => return outcome,
                    None => {}
                }
            }
        };

        let mut guard = PendingGuard {
            cache: self,
            key,
            id,
            armed: true,
        };

        self.compiles.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "sqlgate.cache", %fingerprint, %dialect, "compiling");
        let outcome: Outcome =
            compile().map(|compiled| Arc::new(CachedStatement::new(fingerprint, compiled)));

        guard.armed = false;
        self.complete(key, id, &outcome);
        tx.send_replace(Some(outcome.clone()));
        outcome
    }

    /// Publish a finished compilation, unless the key was invalidated meanwhile.
    fn complete(&self, key: CacheKey, id: u64, outcome: &Outcome) {
        let mut inner = self.lock();
        let still_pending =
            matches!(inner.slots.get(&key), Some(Slot::Pending { id: p, .. }) if *p == id);
        if !still_pending {
            return;
        }

        let stmt = match outcome {
            Ok(stmt) => Arc::clone(stmt),
            Err(_) => {
                inner.slots.remove(&key);
                return;
            }
        };

        let now = Instant::now();
        let tick = inner.next_tick();
        inner.slots.insert(
            key,
            Slot::Ready(Entry {
                stmt,
                inserted: now,
                last_used_tick: tick,
                created_tick: tick,
            }),
        );
        self.evict_if_needed(&mut inner, now);
    }

    fn evict_if_needed(&self, inner: &mut Inner, now: Instant) {
        if inner.ready_len() <= self.config.capacity {
            return;
        }

        for key in inner.expired_keys(self.config.ttl, now) {
            inner.slots.remove(&key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
        }

        while inner.ready_len() > self.config.capacity {
            let Some(key) = inner.least_recently_used() else {
                break;
            };
            inner.slots.remove(&key);
            self.evictions.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(target: "sqlgate.cache", fingerprint = %key.0, dialect = %key.1, "evicted");
        }
    }

    /// Look up a statement without compiling.
    pub fn get(&self, fingerprint: Fingerprint, dialect: Dialect) -> Option<Arc<CachedStatement>> {
        let key = (fingerprint, dialect);
        let now = Instant::now();
        let mut inner = self.lock();

        let expired = match inner.slots.get(&key) {
            Some(Slot::Ready(e)) => is_expired(e, self.config.ttl, now),
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        if expired {
            inner.slots.remove(&key);
            self.expirations.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let stmt = inner.touch(&key);
        if stmt.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        stmt
    }

    /// Drop one key. An in-flight compilation for it will not be cached.
    pub fn invalidate(&self, fingerprint: Fingerprint, dialect: Dialect) -> bool {
        self.lock().slots.remove(&(fingerprint, dialect)).is_some()
    }

    /// Drop everything, including in-flight registrations.
    pub fn clear(&self) {
        let mut inner = self.lock();
        let dropped = inner.slots.len();
        inner.slots.clear();
        tracing::debug!(target: "sqlgate.cache", dropped, "cleared");
    }

    /// Remove every expired entry now. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.lock();
        let expired = inner.expired_keys(self.config.ttl, now);
        for key in &expired {
            inner.slots.remove(key);
        }
        self.expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        if !expired.is_empty() {
            tracing::debug!(target: "sqlgate.cache", removed = expired.len(), "swept expired statements");
        }
        expired.len()
    }

    /// Run [`sweep_expired`](Self::sweep_expired) every `interval` until the
    /// cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                cache.sweep_expired();
            }
        })
    }

    /// Number of compiled statements held.
    pub fn len(&self) -> usize {
        self.lock().ready_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            compiles: self.compiles.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            size: self.len(),
            capacity: self.config.capacity,
        }
    }
}

/// Unregisters a pending slot if the compiling caller unwinds.
struct PendingGuard<'a> {
    cache: &'a StatementCache,
    key: CacheKey,
    id: u64,
    armed: bool,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.cache.lock();
        if matches!(inner.slots.get(&self.key), Some(Slot::Pending { id, .. }) if *id == self.id) {
            inner.slots.remove(&self.key);
        }
    }
}
