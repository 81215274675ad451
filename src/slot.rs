//! Single-flight result slot shared by the orchestrators
//!
//! Holds the one current result of an orchestrator, admits at most one request
//! at a time, and discards results whose generation was invalidated while the
//! request was in flight.

use crate::error::MarketEdgeError;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::debug;

pub struct ResultSlot<T> {
    label: &'static str,
    current: RwLock<Option<Arc<T>>>,
    in_flight: Mutex<()>,
    generation: AtomicU64,
}

/// Proof that the caller holds the in-flight permit
pub struct Ticket<'a> {
    _permit: MutexGuard<'a, ()>,
    generation: u64,
}

impl<'a> Ticket<'a> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl<T> ResultSlot<T> {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            current: RwLock::new(None),
            in_flight: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub async fn current(&self) -> Option<Arc<T>> {
        self.current.read().await.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Claim the slot; overlapping requests are rejected, not queued
    pub fn begin(&self) -> Result<Ticket<'_>> {
        let permit = self
            .in_flight
            .try_lock()
            .map_err(|_| MarketEdgeError::Busy(self.label))?;

        Ok(Ticket {
            _permit: permit,
            generation: self.generation.load(Ordering::SeqCst),
        })
    }

    /// Publish `value` unless the slot was invalidated since `ticket` was issued
    pub async fn commit(&self, ticket: Ticket<'_>, value: T) -> Result<Arc<T>> {
        let mut current = self.current.write().await;
        if !self.is_live(&ticket) {
            debug!(
                label = self.label,
                issued = ticket.generation,
                "Discarding stale result"
            );
            return Err(MarketEdgeError::Cancelled(self.label));
        }

        let value = Arc::new(value);
        *current = Some(Arc::clone(&value));
        Ok(value)
    }

    pub fn is_live(&self, ticket: &Ticket<'_>) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Invalidate in-flight requests; the current value stays
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Invalidate in-flight requests and drop the current value
    pub async fn reset(&self) {
        let mut current = self.current.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *current = None;
    }
}
