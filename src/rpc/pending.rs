//! Request correlation table.
//!
//! Outgoing requests get ids from a strictly increasing counter and park a
//! [`oneshot`] sender here until the matching reply arrives. Replies are
//! matched by id only, so they may arrive in any order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{oneshot, Mutex};

use crate::value::Value;
use crate::{AppError, Result};

/// Receiving half handed to the caller of an outgoing request.
pub type PendingReply = oneshot::Receiver<Result<Value>>;

/// Outstanding outgoing requests, keyed by request id.
#[derive(Debug, Default)]
pub struct PendingCalls {
    next_id: AtomicU64,
    slots: Mutex<HashMap<String, oneshot::Sender<Result<Value>>>>,
}

impl PendingCalls {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next request id and park a slot for its reply.
    pub async fn register(&self) -> (String, PendingReply) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let (tx, rx) = oneshot::channel();
        self.slots.lock().await.insert(id.clone(), tx);
        (id, rx)
    }

    /// Resolve or reject the slot for `id` and remove it.
    ///
    /// A caller that stopped waiting is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`]`("unknown id")` if no request with
    /// that id is outstanding.
    pub async fn complete(&self, id: &str, outcome: Result<Value>) -> Result<()> {
        let slot = self.slots.lock().await.remove(id);
        let Some(slot) = slot else {
            return Err(AppError::Validation("unknown id".into()));
        };
        // The receiver may have been dropped; nothing left to notify.
        let _ = slot.send(outcome);
        Ok(())
    }

    /// Drop the slot for a request that never made it onto the wire.
    pub async fn discard(&self, id: &str) {
        self.slots.lock().await.remove(id);
    }

    /// Number of outstanding requests.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    /// Whether no requests are outstanding.
    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}
