//! Map `agent_id -> active stream handle`, single owner per agent.
//!
//! Registering a handle that displaces an existing one closes the previous
//! handle before returning, upholding the "at most one stream per agent"
//! invariant without a window where both are visible.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{oneshot, Mutex};

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// A handle the registry holds for a live stream. Sending on `close` tells
/// that stream's writer task to shut down. `generation` lets a displaced
/// stream's own cleanup code tell "I was already replaced" apart from
/// "I am still the registered stream" without comparing handles directly.
pub struct StreamHandle {
    generation: u64,
    close: Option<oneshot::Sender<()>>,
}

impl StreamHandle {
    #[must_use]
    pub fn new(close: oneshot::Sender<()>) -> Self {
        Self {
            generation: NEXT_GENERATION.fetch_add(1, Ordering::SeqCst),
            close: Some(close),
        }
    }

    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    fn close(mut self) {
        if let Some(tx) = self.close.take() {
            let _ = tx.send(());
        }
    }
}

#[derive(Default)]
pub struct StreamRegistry {
    streams: Mutex<HashMap<String, StreamHandle>>,
}

impl StreamRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle` for `agent_id`. If a previous handle existed, it
    /// is closed before this call returns.
    pub async fn register(&self, agent_id: &str, handle: StreamHandle) {
        let previous = self.streams.lock().await.insert(agent_id.to_string(), handle);
        if let Some(previous) = previous {
            tracing::info!(%agent_id, "displacing existing stream for agent");
            previous.close();
        }
    }

    /// Removes the registration for `agent_id` iff it is still at
    /// `generation` (a stream that was already displaced by a newer one
    /// must not deregister that newer stream on its own exit).
    pub async fn deregister(&self, agent_id: &str, generation: u64) {
        let mut streams = self.streams.lock().await;
        if streams.get(agent_id).is_some_and(|h| h.generation == generation) {
            streams.remove(agent_id);
        }
    }

    pub async fn is_registered(&self, agent_id: &str) -> bool {
        self.streams.lock().await.contains_key(agent_id)
    }
}
