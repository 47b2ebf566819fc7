//! Ordering guards for overlapping requests.
//!
//! Two problems show up when a view fires requests faster than they come
//! back: an older response landing after a newer one, and the same form
//! being submitted twice. [`RequestSequencer`] handles the first with a
//! per-key sequence number; [`InFlightRegistry`] handles the second.

use std::sync::Arc;

use dashmap::{mapref::entry::Entry, DashMap};
use tracing::debug;

use crate::errors::ServiceError;

/// Ticket handed out by [`RequestSequencer::begin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    key: String,
    seq: u64,
}

impl RequestToken {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Last-request-wins bookkeeping, one counter per resource key.
#[derive(Debug, Clone, Default)]
pub struct RequestSequencer {
    latest: Arc<DashMap<String, u64>>,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request for `key`, superseding any earlier one.
    pub fn begin(&self, key: &str) -> RequestToken {
        let mut latest = self.latest.entry(key.to_string()).or_insert(0);
        *latest += 1;
        RequestToken {
            key: key.to_string(),
            seq: *latest,
        }
    }

    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.latest
            .get(&token.key)
            .map_or(false, |latest| *latest == token.seq)
    }

    /// Passes `value` through only if `token` is still the newest for its key.
    pub fn accept<T>(&self, token: &RequestToken, value: T) -> Option<T> {
        if self.is_current(token) {
            Some(value)
        } else {
            debug!(key = %token.key, seq = token.seq, "discarding stale response");
            None
        }
    }

    /// Like [`accept`](Self::accept) for a whole call result: a superseded
    /// request yields `Ok(None)` whether it succeeded or failed.
    pub fn settle<T, E>(&self, token: &RequestToken, result: Result<T, E>) -> Result<Option<T>, E> {
        match self.accept(token, result) {
            Some(result) => result.map(Some),
            None => Ok(None),
        }
    }
}

/// Keys with a submission currently on the wire.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<DashMap<String, ()>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key` until the returned guard is dropped.
    ///
    /// Fails with [`ServiceError::DuplicateSubmission`] while another guard
    /// for the same key is alive.
    pub fn try_acquire(&self, key: &str) -> Result<InFlightGuard, ServiceError> {
        match self.active.entry(key.to_string()) {
            Entry::Occupied(_) => Err(ServiceError::DuplicateSubmission(format!(
                "{key} is already being processed"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    registry: self.active.clone(),
                    key: key.to_string(),
                })
            }
        }
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.active.contains_key(key)
    }
}

/// Releases its key on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    registry: Arc<DashMap<String, ()>>,
    key: String,
}

impl InFlightGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.key);
    }
}
