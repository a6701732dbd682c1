use std::collections::HashMap;

use tokio::sync::RwLock;

/// In-memory map from channel identity to verified external identity
/// (email). At most one identity per channel; a later login overwrites.
/// Entries persist for the process lifetime unless removed by logout.
#[derive(Default)]
pub struct IdentityTable {
    entries: RwLock<HashMap<String, String>>,
}

impl IdentityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a verified email to a channel. Returns the previous binding.
    pub async fn set(&self, channel_id: &str, email: &str) -> Option<String> {
        self.entries
            .write()
            .await
            .insert(channel_id.to_string(), email.to_string())
    }

    pub async fn get(&self, channel_id: &str) -> Option<String> {
        self.entries.read().await.get(channel_id).cloned()
    }

    /// Remove the binding (logout). Returns the removed email.
    pub async fn remove(&self, channel_id: &str) -> Option<String> {
        self.entries.write().await.remove(channel_id)
    }

    pub async fn is_authenticated(&self, channel_id: &str) -> bool {
        self.entries.read().await.contains_key(channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn later_login_overwrites() {
        let table = IdentityTable::new();
        assert!(table.set("555", "old@example.com").await.is_none());
        let previous = table.set("555", "new@example.com").await;
        assert_eq!(previous.as_deref(), Some("old@example.com"));
        assert_eq!(table.get("555").await.as_deref(), Some("new@example.com"));
    }

    #[tokio::test]
    async fn logout_removes_binding() {
        let table = IdentityTable::new();
        table.set("555", "user@example.com").await;
        assert!(table.is_authenticated("555").await);

        let removed = table.remove("555").await;
        assert_eq!(removed.as_deref(), Some("user@example.com"));
        assert!(!table.is_authenticated("555").await);
        assert!(table.remove("555").await.is_none());
    }
}
