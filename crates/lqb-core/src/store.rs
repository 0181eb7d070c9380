//! Best-effort session cache on top of a TTL key-value backend.
//!
//! The durable lead record stays authoritative; this layer only accelerates
//! reads and powers the "resume after a gap" experience. Every failure path
//! degrades to a cache miss; nothing here may fail a turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Language, LeadKey};
use crate::lead::{ConversationState, Lead, Slot, SlotValues};
use crate::Result;

/// Key-value backend with per-key expiry (`SETEX`/`GET`/`DEL` semantics).
#[async_trait]
pub trait TtlStore: Send + Sync {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn del(&self, key: &str) -> Result<()>;
}

/// Cached projection of the conversational part of a lead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub state: ConversationState,
    pub slots: SlotValues,
    pub pending_slot: Option<Slot>,
    pub language: Language,
}

impl From<&Lead> for SessionContext {
    fn from(lead: &Lead) -> Self {
        Self {
            state: lead.state,
            slots: lead.slots.clone(),
            pending_slot: lead.pending_slot,
            language: lead.language,
        }
    }
}

#[derive(Clone)]
pub struct ContextStore {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl ContextStore {
    pub fn new(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(key: &LeadKey) -> String {
        format!("ctx:{key}")
    }

    /// Save is best-effort: backend unavailability loses only the resume UX,
    /// so failures are reported as `false`, never propagated.
    pub async fn save(&self, key: &LeadKey, ctx: &SessionContext) -> bool {
        let Ok(body) = serde_json::to_string(ctx) else {
            return false;
        };
        self.store
            .set(&Self::key(key), &body, self.ttl)
            .await
            .is_ok()
    }

    /// `None` covers miss, expiry and corruption alike; a corrupted entry is
    /// deleted eagerly so it cannot accumulate.
    pub async fn get(&self, key: &LeadKey) -> Option<SessionContext> {
        let raw = self.store.get(&Self::key(key)).await.ok()??;
        match serde_json::from_str(&raw) {
            Ok(ctx) => Some(ctx),
            Err(_) => {
                let _ = self.store.del(&Self::key(key)).await;
                None
            }
        }
    }

    pub async fn invalidate(&self, key: &LeadKey) {
        let _ = self.store.del(&Self::key(key)).await;
    }
}

// === Timeout tracker ===

const NUDGE_OWED: &str = "owed";
const NUDGE_SENT: &str = "sent";

/// Records whether a follow-up nudge is owed to a user who stalled
/// mid-conversation. Separate short-TTL namespace next to the context cache;
/// cleared the moment the user responds, flipped to "sent" after dispatch so
/// a nudge is never duplicated.
#[derive(Clone)]
pub struct TimeoutTracker {
    store: Arc<dyn TtlStore>,
    ttl: Duration,
}

impl TimeoutTracker {
    pub fn new(store: Arc<dyn TtlStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    fn key(key: &LeadKey) -> String {
        format!("nudge:{key}")
    }

    /// A new mark supersedes any prior one (fresh TTL window).
    pub async fn mark_owed(&self, key: &LeadKey) -> bool {
        self.store
            .set(&Self::key(key), NUDGE_OWED, self.ttl)
            .await
            .is_ok()
    }

    pub async fn is_owed(&self, key: &LeadKey) -> bool {
        matches!(
            self.store.get(&Self::key(key)).await,
            Ok(Some(v)) if v == NUDGE_OWED
        )
    }

    pub async fn mark_sent(&self, key: &LeadKey) -> bool {
        self.store
            .set(&Self::key(key), NUDGE_SENT, self.ttl)
            .await
            .is_ok()
    }

    pub async fn clear(&self, key: &LeadKey) {
        let _ = self.store.del(&Self::key(key)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TenantId, UserKey};
    use crate::memory::MemoryTtlStore;
    use crate::Error;

    fn key() -> LeadKey {
        LeadKey::new(
            TenantId("42".to_string()),
            UserKey::normalize("555").unwrap(),
        )
    }

    fn ctx() -> SessionContext {
        SessionContext {
            state: ConversationState::SlotFilling,
            slots: SlotValues::default(),
            pending_slot: Some(Slot::Budget),
            language: Language::En,
        }
    }

    /// Backend that fails every call, for the degradation paths.
    struct DownStore;

    #[async_trait]
    impl TtlStore for DownStore {
        async fn set(&self, _k: &str, _v: &str, _ttl: Duration) -> Result<()> {
            Err(Error::Storage("backend down".to_string()))
        }
        async fn get(&self, _k: &str) -> Result<Option<String>> {
            Err(Error::Storage("backend down".to_string()))
        }
        async fn del(&self, _k: &str) -> Result<()> {
            Err(Error::Storage("backend down".to_string()))
        }
    }

    #[tokio::test]
    async fn round_trips_context() {
        let store = Arc::new(MemoryTtlStore::new());
        let ctxs = ContextStore::new(store, Duration::from_secs(60));
        assert!(ctxs.save(&key(), &ctx()).await);
        assert_eq!(ctxs.get(&key()).await, Some(ctx()));
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_miss() {
        let ctxs = ContextStore::new(Arc::new(DownStore), Duration::from_secs(60));
        assert!(!ctxs.save(&key(), &ctx()).await);
        assert_eq!(ctxs.get(&key()).await, None);
    }

    #[tokio::test]
    async fn corrupted_entry_is_deleted_and_reads_as_miss() {
        let store = Arc::new(MemoryTtlStore::new());
        let ctxs = ContextStore::new(store.clone(), Duration::from_secs(60));

        store
            .set("ctx:42:555", "{not json", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(ctxs.get(&key()).await, None);
        // Deleted eagerly, not left to rot until TTL.
        assert_eq!(store.get("ctx:42:555").await.unwrap(), None);
    }

    #[tokio::test]
    async fn tracker_clear_and_sent_suppress_nudges() {
        let store = Arc::new(MemoryTtlStore::new());
        let tracker = TimeoutTracker::new(store, Duration::from_secs(600));
        let k = key();

        assert!(tracker.mark_owed(&k).await);
        assert!(tracker.is_owed(&k).await);

        tracker.clear(&k).await;
        assert!(!tracker.is_owed(&k).await);

        assert!(tracker.mark_owed(&k).await);
        assert!(tracker.mark_sent(&k).await);
        assert!(!tracker.is_owed(&k).await);
    }
}
