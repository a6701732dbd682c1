use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use {
    base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD},
    rand::RngCore,
    tokio::sync::Mutex,
    tracing::debug,
};

/// A login attempt awaiting its provider callback.
#[derive(Debug, Clone)]
pub struct PendingAuth {
    pub channel_id: String,
    pub issued_at: Instant,
}

/// Time-bounded, in-memory map from single-use state tokens to the channel
/// that initiated the login.
///
/// Lifecycle per token: created → consumed (callback) or created → expired
/// (sweep or lazy check). A consumed or expired token is never accepted
/// again, and "not found" is indistinguishable across expired, consumed, and
/// never-issued — callers get no state-existence oracle.
pub struct PendingAuthStore {
    entries: Mutex<HashMap<String, PendingAuth>>,
    ttl: Duration,
}

impl PendingAuthStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a fresh unguessable state token bound to `channel_id`.
    pub async fn issue_state(&self, channel_id: &str) -> String {
        let token = generate_state_token();
        self.entries.lock().await.insert(token.clone(), PendingAuth {
            channel_id: channel_id.to_string(),
            issued_at: Instant::now(),
        });
        token
    }

    /// Atomic lookup-and-delete. An entry past its TTL is rejected here even
    /// if the sweep has not run yet.
    pub async fn consume_state(&self, token: &str) -> Option<PendingAuth> {
        let mut entries = self.entries.lock().await;
        let entry = entries.remove(token)?;
        if entry.issued_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry)
    }

    /// Remove expired entries. Returns how many were dropped.
    pub async fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, e| e.issued_at.elapsed() <= ttl);
        before - entries.len()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Run `sweep` on a fixed period until process shutdown. The interval
    /// must be <= the TTL to bound how long an expired entry can linger.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            loop {
                tick.tick().await;
                let removed = store.sweep().await;
                if removed > 0 {
                    debug!(removed, "swept expired login states");
                }
            }
        });
    }
}

/// 32 random bytes, url-safe base64. Unguessable and collision-free for the
/// volumes a gateway sees.
fn generate_state_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
