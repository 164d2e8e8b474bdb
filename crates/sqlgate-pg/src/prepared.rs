//! Per-connection LRU of prepared statements, keyed by SQL text.

use crate::error::PgError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use tokio_postgres::Statement;

#[derive(Debug)]
pub(crate) struct PreparedCache<S = Statement> {
    inner: Mutex<PreparedCacheInner<S>>,
}

#[derive(Debug)]
struct PreparedCacheInner<S> {
    capacity: usize,
    map: HashMap<String, S>,
    order: VecDeque<String>,
}

impl<S: Clone> PreparedCache<S> {
    /// A capacity of 0 disables caching.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(PreparedCacheInner {
                capacity,
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub(crate) fn get(&self, sql: &str) -> Option<S> {
        let mut inner = self.lock();
        let stmt = inner.map.get(sql).cloned()?;
        inner.touch(sql);
        Some(stmt)
    }

    /// Insert `stmt` unless another caller prepared the same SQL first, and
    /// return whichever statement is cached.
    pub(crate) fn insert_if_absent(&self, sql: &str, stmt: S) -> S {
        let mut inner = self.lock();

        if let Some(existing) = inner.map.get(sql).cloned() {
            inner.touch(sql);
            return existing;
        }

        inner.map.insert(sql.to_string(), stmt.clone());
        inner.order.push_back(sql.to_string());
        inner.evict_if_needed();
        stmt
    }

    pub(crate) fn remove(&self, sql: &str) -> Option<S> {
        let mut inner = self.lock();
        let removed = inner.map.remove(sql);
        if removed.is_some() {
            inner.remove_from_order(sql);
        }
        removed
    }

    pub(crate) fn clear(&self) {
        let mut inner = self.lock();
        inner.map.clear();
        inner.order.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().map.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PreparedCacheInner<S>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S> PreparedCacheInner<S> {
    fn touch(&mut self, sql: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == sql) {
            if let Some(k) = self.order.remove(pos) {
                self.order.push_back(k);
            }
        }
    }

    fn remove_from_order(&mut self, sql: &str) {
        if let Some(pos) = self.order.iter().position(|k| k.as_str() == sql) {
            let _ = self.order.remove(pos);
        }
    }

    fn evict_if_needed(&mut self) {
        if self.capacity == 0 {
            self.map.clear();
            self.order.clear();
            return;
        }

        while self.map.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            let _ = self.map.remove(&oldest);
        }
    }
}

/// Whether a failed prepared execution should be retried after re-preparing.
pub(crate) fn is_retryable_prepared_error(err: &PgError) -> bool {
    let PgError::Database(e) = err else {
        return false;
    };
    let Some(db_err) = e.as_db_error() else {
        return false;
    };
    is_retryable_sqlstate(db_err.code().code(), db_err.message())
}

fn is_retryable_sqlstate(code: &str, message: &str) -> bool {
    match code {
        // "cached plan must not change result type" (e.g. after schema change)
        "0A000" => message
            .to_ascii_lowercase()
            .contains("cached plan must not change result type"),
        // invalid_sql_statement_name
        "26000" => true,
        _ => false,
    }
}
