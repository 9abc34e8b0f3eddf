//! Live updates for a single watched row
//!
//! The row is re-fetched on an interval and compared with the last value
//! seen, producing insert/update/delete events for that one row.

use bevy::prelude::*;
use std::time::Duration;

#[derive(Clone, Debug, PartialEq)]
pub enum RowChange<T> {
    Inserted(T),
    Updated { old: T, new: T },
    Deleted(T),
}

/// Event for the transition `previous -> next`, or None if nothing changed.
pub fn diff_row<T: Clone + PartialEq>(previous: Option<&T>, next: Option<&T>) -> Option<RowChange<T>> {
    match (previous, next) {
        (None, None) => None,
        (None, Some(new)) => Some(RowChange::Inserted(new.clone())),
        (Some(old), None) => Some(RowChange::Deleted(old.clone())),
        (Some(old), Some(new)) if old == new => None,
        (Some(old), Some(new)) => Some(RowChange::Updated {
            old: old.clone(),
            new: new.clone(),
        }),
    }
}

/// Polling subscription to the row owned by `owner_id`
#[derive(Debug, Clone)]
pub struct RowWatch<T> {
    pub owner_id: Option<String>,
    last: Option<T>,
    primed: bool,
    interval: Duration,
    last_request: Option<Duration>,
}

impl<T: Clone + PartialEq> RowWatch<T> {
    pub fn new(interval: Duration) -> Self {
        Self {
            owner_id: None,
            last: None,
            primed: false,
            interval,
            last_request: None,
        }
    }

    /// Start watching a different owner; forgets the previous row.
    pub fn watch(&mut self, owner_id: Option<String>) {
        if self.owner_id != owner_id {
            self.owner_id = owner_id;
            self.last = None;
            self.primed = false;
            self.last_request = None;
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.last.as_ref()
    }

    /// Whether a re-fetch should be issued at `now` (time since app start).
    pub fn due(&self, now: Duration) -> bool {
        self.owner_id.is_some()
            && self
                .last_request
                .is_none_or(|last| now.saturating_sub(last) >= self.interval)
    }

    pub fn mark_requested(&mut self, now: Duration) {
        self.last_request = Some(now);
    }

    /// Record a fetch result for `owner_id`. Results for an owner no longer
    /// watched are dropped. The first result only primes the watch.
    pub fn observe(&mut self, owner_id: &str, next: Option<T>) -> Option<RowChange<T>> {
        if self.owner_id.as_deref() != Some(owner_id) {
            return None;
        }
        let change = if self.primed {
            diff_row(self.last.as_ref(), next.as_ref())
        } else {
            None
        };
        self.primed = true;
        self.last = next;
        change
    }
}

/// Live change on the signed-in member's brand row
#[derive(Message, Clone, Debug)]
pub struct BrandChanged(pub RowChange<crate::backend::types::Brand>);
