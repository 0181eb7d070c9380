//! Deferred follow-up nudges for stalled conversations.
//!
//! After each mid-conversation turn a deferred task is armed; scheduling
//! again supersedes the previous task (cancellation token), and an inbound
//! message cancels it outright. The timeout tracker entry, not the task, is
//! the dedup authority: the task re-checks it at fire time and marks it sent
//! before dispatch, so a nudge goes out at most once per stall.

use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{Language, LeadKey},
    messaging::{port::OutboundPort, types::OutboundMessage},
    store::TimeoutTracker,
    texts,
    utils::{AuditEvent, AuditLogger},
};

#[derive(Clone)]
pub struct NudgeScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    tracker: TimeoutTracker,
    outbound: Arc<dyn OutboundPort>,
    audit: Arc<AuditLogger>,
    delay: Duration,
    pending: Mutex<HashMap<LeadKey, CancellationToken>>,
}

impl NudgeScheduler {
    pub fn new(
        tracker: TimeoutTracker,
        outbound: Arc<dyn OutboundPort>,
        audit: Arc<AuditLogger>,
        delay: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                tracker,
                outbound,
                audit,
                delay,
                pending: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Arm (or re-arm) the nudge for a lead. Any earlier pending nudge for
    /// the same lead is superseded.
    pub async fn schedule(&self, key: &LeadKey, language: Language) {
        let token = CancellationToken::new();
        {
            let mut pending = self.inner.pending.lock().await;
            if let Some(prev) = pending.insert(key.clone(), token.clone()) {
                prev.cancel();
            }
        }

        if !self.inner.tracker.mark_owed(key).await {
            // Tracker backend down: skip the nudge rather than risk sending
            // duplicates we cannot record.
            return;
        }

        let inner = self.inner.clone();
        let key = key.clone();
        tokio::spawn(async move {
            tokio::select! {
              _ = token.cancelled() => {}
              _ = tokio::time::sleep(inner.delay) => {
                if inner.tracker.is_owed(&key).await {
                    let _ = inner.tracker.mark_sent(&key).await;
                    let _ = inner
                        .outbound
                        .send(&key.user, OutboundMessage::text(texts::nudge(language)))
                        .await;
                    let _ = inner.audit.write(AuditEvent::nudge(&key));
                }
              }
            }
            inner.pending.lock().await.remove(&key);
        });
    }

    /// The user responded: cancel the pending task and clear the tracker.
    pub async fn cancel(&self, key: &LeadKey) {
        if let Some(token) = self.inner.pending.lock().await.remove(key) {
            token.cancel();
        }
        self.inner.tracker.clear(key).await;
    }
}
