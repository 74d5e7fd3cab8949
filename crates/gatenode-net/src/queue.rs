//! Durable offline queue for requests that could not be delivered.
//!
//! Requests that fail with a transient error class are parked here and
//! resent oldest-first once the link returns. The queue is bounded with
//! evict-oldest overflow, serialized to a single blob after every mutation,
//! and reloaded on boot, so a reboot mid-outage loses nothing that was
//! already queued.
//!
//! Critical entries (access events, alarm reports) are moved ahead of
//! routine telemetry before a drain cycle, preserving relative order within
//! each class.

use chrono::Utc;
use gatenode_core::constants::BLOB_OFFLINE_QUEUE;
use gatenode_core::{BoundedRing, HttpMethod};
use gatenode_storage::BlobStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One request parked for later delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRequest {
    /// Absolute URL the request targets.
    pub url: String,
    /// HTTP verb.
    pub method: HttpMethod,
    /// JSON body bytes.
    pub payload: Vec<u8>,
    /// When the request was queued, as epoch milliseconds.
    pub timestamp: i64,
    /// Resend attempts consumed so far.
    pub retries: u32,
    /// Whether this entry jumps ahead of routine entries on drain.
    pub critical: bool,
}

impl QueuedRequest {
    /// Create an entry stamped with the current time.
    pub fn new(
        url: impl Into<String>,
        method: HttpMethod,
        payload: Vec<u8>,
        critical: bool,
    ) -> Self {
        Self {
            url: url.into(),
            method,
            payload,
            timestamp: Utc::now().timestamp_millis(),
            retries: 0,
            critical,
        }
    }
}

/// Serialized blob layout: a versioned wrapper around the entries.
#[derive(Debug, Serialize, Deserialize)]
struct QueueSnapshot {
    queue: Vec<QueuedRequest>,
}

/// Bounded, durable FIFO of undelivered requests.
#[derive(Debug)]
pub struct OfflineQueue<S: BlobStore> {
    ring: BoundedRing<QueuedRequest>,
    store: S,
}

impl<S: BlobStore> OfflineQueue<S> {
    /// Create an empty queue with the given capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(store: S, capacity: usize) -> Self {
        Self {
            ring: BoundedRing::new(capacity),
            store,
        }
    }

    /// Number of entries waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Whether the next enqueue would evict the oldest entry.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Borrow the next entry to resend.
    #[must_use]
    pub fn front(&self) -> Option<&QueuedRequest> {
        self.ring.front()
    }

    /// Mutably borrow the next entry, for bumping its retry count.
    pub fn front_mut(&mut self) -> Option<&mut QueuedRequest> {
        self.ring.front_mut()
    }

    /// Iterate over the waiting entries, oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &QueuedRequest> {
        self.ring.iter()
    }

    /// Park a request, evicting the oldest entry when full.
    ///
    /// The evicted entry is returned so the caller can log the data loss.
    /// The new state is persisted before returning.
    pub async fn enqueue(&mut self, request: QueuedRequest) -> Option<QueuedRequest> {
        let evicted = self.ring.push(request);
        if let Some(old) = &evicted {
            warn!(url = %old.url, "queue full, evicting oldest entry");
        }
        self.persist().await;
        evicted
    }

    /// Remove the front entry after it was delivered (or dropped), then
    /// persist.
    pub async fn pop_front(&mut self) -> Option<QueuedRequest> {
        let popped = self.ring.pop_front();
        if popped.is_some() {
            self.persist().await;
        }
        popped
    }

    /// Move critical entries ahead of routine ones, preserving relative
    /// order within each class, then persist.
    pub async fn prioritize(&mut self) {
        self.ring.stable_partition_by(|r| r.critical);
        self.persist().await;
    }

    /// Persist the current entries to the blob store.
    ///
    /// An empty queue removes the blob instead of writing an empty
    /// snapshot. Persistence failures are logged, not propagated: the queue
    /// keeps working in memory for the rest of this boot.
    pub async fn persist(&mut self) {
        if self.ring.is_empty() {
            if let Err(e) = self.store.remove(BLOB_OFFLINE_QUEUE).await {
                warn!(error = %e, "failed to remove queue blob");
            }
            return;
        }

        let snapshot = QueueSnapshot {
            queue: self.ring.iter().cloned().collect(),
        };
        match serde_json::to_vec(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.store.write(BLOB_OFFLINE_QUEUE, &raw).await {
                    warn!(error = %e, "failed to persist queue");
                }
            }
            Err(e) => warn!(error = %e, "queue serialization failed"),
        }
    }

    /// Reload the queue from the blob store, replacing in-memory entries.
    ///
    /// A corrupt blob is discarded so one bad flash write cannot wedge the
    /// queue forever.
    pub async fn load(&mut self) {
        match self.store.read(BLOB_OFFLINE_QUEUE).await {
            Ok(Some(raw)) => match serde_json::from_slice::<QueueSnapshot>(&raw) {
                Ok(snapshot) => {
                    debug!(entries = snapshot.queue.len(), "restored offline queue");
                    self.ring.restore(snapshot.queue);
                }
                Err(e) => {
                    warn!(error = %e, "discarding corrupt queue blob");
                    let _ = self.store.remove(BLOB_OFFLINE_QUEUE).await;
                }
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "queue blob unreadable"),
        }
    }
}
