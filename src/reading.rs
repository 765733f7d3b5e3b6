use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local};

use crate::sensor::Status;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub co2_ppm: u16,
    pub voc_ppm: u16,
    pub status: Status,
    pub measured_at: Option<DateTime<Local>>,
}

/// Latest [`Reading`], shared between the poller and the metrics handlers.
///
/// Clones share the same value. Readers take the lock shared and copy the
/// reading out, so concurrent scrapes never wait on each other.
#[derive(Debug, Clone, Default)]
pub struct ReadingCell {
    inner: Arc<RwLock<Reading>>,
}

impl ReadingCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&self, reading: Reading) {
        // Writes are a single assignment, so a poisoned value is still whole.
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = reading;
    }

    pub fn read(&self) -> Reading {
        read_shared(&self.inner)
    }

    /// A handle that can observe the cell but never write to it.
    pub fn view(&self) -> ReadingView {
        ReadingView {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Read-only side of a [`ReadingCell`], handed to the metrics server.
#[derive(Debug, Clone)]
pub struct ReadingView {
    inner: Arc<RwLock<Reading>>,
}

impl ReadingView {
    pub fn read(&self) -> Reading {
        read_shared(&self.inner)
    }
}

fn read_shared(lock: &RwLock<Reading>) -> Reading {
    *lock.read().unwrap_or_else(PoisonError::into_inner)
}
