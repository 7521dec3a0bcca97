//! Surface Registry - Rendering Surface Subscriptions
//!
//! Rendering surfaces (a fullscreen window, a preview on the operator's
//! laptop, the headless stdout writer) subscribe here and receive every
//! [`DisplayMessage`] the dispatcher publishes, in publish order.
//!
//! # Architecture
//!
//! ```text
//!                      SurfaceRegistry
//!                     ┌───────────────────────────────────────┐
//!                     │ HashMap<ConnectionId, SurfaceHandle>  │
//!                     │   - wrapped in Arc<RwLock<>>          │
//!                     └───────────────┬───────────────────────┘
//!                                     │
//!              ┌──────────────────────┼──────────────────────┐
//!              │                      │                      │
//!       ┌──────▼──────┐       ┌───────▼──────┐       ┌───────▼──────┐
//!       │  Fullscreen │       │   Preview    │       │   Stdout     │
//!       │   conn-1    │       │   conn-2     │       │   conn-3     │
//!       └─────────────┘       └──────────────┘       └──────────────┘
//! ```
//!
//! # Thread Safety
//!
//! The registry uses `Arc<RwLock<>>`: publishing only reads the map, while
//! subscribing and unsubscribing take the write lock briefly. The lock is
//! never held across an `.await`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::messages::DisplayMessage;

/// Default per-surface channel capacity
pub const DEFAULT_SURFACE_CAPACITY: usize = 256;

/// Unique identifier for a subscribed surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new unique connection ID
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Get the raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to a subscribed surface
#[derive(Debug)]
pub struct SurfaceHandle {
    /// Unique connection identifier
    pub id: ConnectionId,
    /// Human-readable surface name for logs
    pub name: String,
    /// Channel to send messages to this surface
    pub tx: mpsc::Sender<DisplayMessage>,
}

impl SurfaceHandle {
    /// Create a new surface handle
    #[must_use]
    pub fn new(id: ConnectionId, name: impl Into<String>, tx: mpsc::Sender<DisplayMessage>) -> Self {
        Self {
            id,
            name: name.into(),
            tx,
        }
    }
}

/// Result of a broadcast operation
#[derive(Debug, Clone, Default)]
pub struct BroadcastResult {
    /// Number of surfaces that received the message
    pub successful: usize,
    /// Number of surfaces that could not receive it
    pub failed: usize,
    /// IDs of surfaces that failed
    pub failed_ids: Vec<ConnectionId>,
}

/// Registry of subscribed rendering surfaces
#[derive(Clone, Default)]
pub struct SurfaceRegistry {
    inner: Arc<RwLock<HashMap<ConnectionId, SurfaceHandle>>>,
}

impl SurfaceRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an existing handle
    pub fn register(&self, handle: SurfaceHandle) -> ConnectionId {
        let id = handle.id;
        tracing::info!(connection_id = %id, surface = %handle.name, "Surface registered");
        self.inner.write().insert(id, handle);
        id
    }

    /// Create a channel, register its sending half, return the receiving half
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<DisplayMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = self.register(SurfaceHandle::new(ConnectionId::new(), name, tx));
        (id, rx)
    }

    /// Unregister a surface
    ///
    /// Returns the handle if it was registered.
    pub fn unregister(&self, id: &ConnectionId) -> Option<SurfaceHandle> {
        let handle = self.inner.write().remove(id);
        if let Some(ref h) = handle {
            tracing::info!(connection_id = %id, surface = %h.name, "Surface unregistered");
        }
        handle
    }

    /// Drop every subscription, closing all surface channels
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        if !inner.is_empty() {
            tracing::debug!(count = inner.len(), "Closing all surface channels");
        }
        inner.clear();
    }

    /// Number of subscribed surfaces
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    /// Broadcast, waiting for each surface to accept the message
    ///
    /// Waiting preserves ordering and never drops a delta for a slow surface.
    pub async fn broadcast_async(&self, message: &DisplayMessage) -> BroadcastResult {
        // Collect senders to avoid holding the lock during async operations
        let senders: Vec<(ConnectionId, mpsc::Sender<DisplayMessage>)> = {
            let inner = self.inner.read();
            inner.iter().map(|(id, h)| (*id, h.tx.clone())).collect()
        };

        let mut result = BroadcastResult::default();
        for (id, tx) in senders {
            if tx.send(message.clone()).await.is_ok() {
                result.successful += 1;
            } else {
                result.failed += 1;
                result.failed_ids.push(id);
            }
        }

        result
    }
}
