//! TTL-bounded store for captured text
//!
//! An entry holds the text together with the ticket it arrived with, so a
//! claim always returns the metadata of the text it hands out. Each entry
//! owns the abort handle of exactly one purge timer. `put`,
//! `take_and_remove` and the purge itself all go through the map's per-key
//! lock, so they never observe the same entry at the same time. Entries with
//! different ids live behind independent shard locks.

use cybersafe_core::{Error, EventTicket, Result, SensitiveText};
use cybersafe_telemetry::PipelineMetrics;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

struct BufferEntry {
    ticket: EventTicket,
    text: SensitiveText,
    expires_at: Instant,
    /// Distinguishes this entry from an earlier one stored under the same id
    generation: u64,
    purge: AbortHandle,
}

/// Map from event id to buffered text, purged after a fixed TTL
pub struct EphemeralStore {
    entries: Arc<DashMap<String, BufferEntry>>,
    ttl: Duration,
    timers: Handle,
    next_generation: AtomicU64,
    metrics: PipelineMetrics,
}

impl EphemeralStore {
    /// Create a store whose purge timers run on the current Tokio runtime
    pub fn new(ttl: Duration, metrics: PipelineMetrics) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::internal(format!("ephemeral store needs a Tokio runtime: {}", e)))?;
        Ok(Self::with_handle(ttl, handle, metrics))
    }

    /// Create a store whose purge timers run on `handle`
    pub fn with_handle(ttl: Duration, handle: Handle, metrics: PipelineMetrics) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            timers: handle,
            next_generation: AtomicU64::new(0),
            metrics,
        }
    }

    /// Buffer `text` under the ticket's id and arm its purge timer.
    ///
    /// An existing entry for the id is replaced: its timer is cancelled and
    /// its ticket and text dropped.
    pub fn put(&self, ticket: EventTicket, text: SensitiveText) {
        let id = ticket.id.clone();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now() + self.ttl;

        match self.entries.entry(id.clone()) {
            Entry::Occupied(mut occupied) => {
                let purge = self.arm_purge(id, generation, expires_at);
                let previous = occupied.insert(BufferEntry {
                    ticket,
                    text,
                    expires_at,
                    generation,
                    purge,
                });
                previous.purge.abort();
                debug!(id = %occupied.key(), "replaced buffered entry");
            }
            Entry::Vacant(vacant) => {
                let purge = self.arm_purge(id, generation, expires_at);
                vacant.insert(BufferEntry {
                    ticket,
                    text,
                    expires_at,
                    generation,
                    purge,
                });
            }
        }
    }

    /// Claim the ticket and text for `id`, cancelling its purge timer.
    ///
    /// Returns `None` if the id was never stored, was already claimed, or
    /// has outlived its TTL. An expired entry found here is discarded
    /// without counting as purged; the caller accounts for the miss.
    pub fn take_and_remove(&self, id: &str) -> Option<(EventTicket, SensitiveText)> {
        let (_, entry) = self.entries.remove(id)?;
        entry.purge.abort();

        if Instant::now() >= entry.expires_at {
            // Timer was due but had not run yet.
            debug!(id = %id, "claimed entry had already expired");
            return None;
        }

        Some((entry.ticket, entry.text))
    }

    /// Check whether a live entry exists for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.entries
            .get(id)
            .map(|entry| Instant::now() < entry.expires_at)
            .unwrap_or(false)
    }

    /// Number of buffered entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry and cancel every timer. Returns how many were held.
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        self.entries.retain(|_, entry| {
            entry.purge.abort();
            cleared += 1;
            false
        });
        cleared
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn arm_purge(&self, id: String, generation: u64, expires_at: Instant) -> AbortHandle {
        let entries = Arc::clone(&self.entries);
        let metrics = self.metrics.clone();

        self.timers
            .spawn(async move {
                tokio::time::sleep_until(expires_at).await;
                if entries
                    .remove_if(&id, |_, entry| entry.generation == generation)
                    .is_some()
                {
                    metrics.record_purged();
                    debug!(id = %id, "purged expired entry");
                }
            })
            .abort_handle()
    }
}

impl Drop for EphemeralStore {
    fn drop(&mut self) {
        self.clear();
    }
}
