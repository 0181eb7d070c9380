//! The turn pipeline: resolve tenant → serialize per lead → load → recover →
//! transition → persist → rescore → cache.
//!
//! Concurrency contract: turns for different (tenant, user) pairs run fully
//! independently; turns for the same pair are serialized by a per-lead mutex
//! held across the whole read-compute-persist span, so two near-simultaneous
//! messages can never apply against the same stale snapshot. The durable
//! lead record is the only transactional resource: the cache is written
//! after the commit and its failures never roll anything back.

use std::{collections::HashMap, sync::Arc};

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    brain::{Brain, Effect, Event, Transition},
    config::Config,
    domain::{LeadKey, UserKey},
    errors::Error,
    identity::{IdentityRouter, Resolution},
    lead::Lead,
    messaging::{port::OutboundPort, types::Action, types::OutboundMessage},
    nudge::NudgeScheduler,
    ports::{LeadRepository, LockRepository},
    recovery, scoring,
    store::{ContextStore, SessionContext, TimeoutTracker, TtlStore},
    texts,
    throttle::FloodLimiter,
    utils::{AuditEvent, AuditLogger},
    Result,
};

/// Normalized inbound event from a transport adapter.
#[derive(Clone, Debug, Default)]
pub struct Inbound {
    /// Raw transport identifier (phone number / chat id), not yet normalized.
    pub identifier: String,
    pub text: Option<String>,
    pub action: Option<Action>,
    pub contact: Option<ContactShare>,
    pub voice_note: bool,
}

#[derive(Clone, Debug)]
pub struct ContactShare {
    pub phone: String,
    pub name: Option<String>,
}

/// Per-lead mutual exclusion, so transitions for one user are serialized
/// while unrelated users proceed in parallel.
#[derive(Default)]
pub struct LeadLocks {
    inner: Mutex<HashMap<LeadKey, Arc<Mutex<()>>>>,
}

impl LeadLocks {
    pub async fn acquire(&self, key: &LeadKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().await;
            map.entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

pub struct ConversationService {
    cfg: Arc<Config>,
    repo: Arc<dyn LeadRepository>,
    router: IdentityRouter,
    brain: Brain,
    context: ContextStore,
    nudges: NudgeScheduler,
    outbound: Arc<dyn OutboundPort>,
    flood: Mutex<FloodLimiter>,
    locks: LeadLocks,
    audit: Arc<AuditLogger>,
}

impl ConversationService {
    pub fn new(
        cfg: Arc<Config>,
        repo: Arc<dyn LeadRepository>,
        lock_repo: Arc<dyn LockRepository>,
        ttl: Arc<dyn TtlStore>,
        outbound: Arc<dyn OutboundPort>,
    ) -> Self {
        let audit = Arc::new(AuditLogger::new(
            cfg.audit_log_path.clone(),
            cfg.audit_log_json,
        ));
        let tracker = TimeoutTracker::new(ttl.clone(), cfg.nudge_ttl);
        Self {
            router: IdentityRouter::new(lock_repo, cfg.vertical.clone()),
            brain: Brain::default(),
            context: ContextStore::new(ttl, cfg.context_ttl),
            nudges: NudgeScheduler::new(tracker, outbound.clone(), audit.clone(), cfg.nudge_delay),
            flood: Mutex::new(FloodLimiter::new(
                cfg.flood_enabled,
                cfg.flood_requests,
                cfg.flood_window,
            )),
            locks: LeadLocks::default(),
            cfg,
            repo,
            outbound,
            audit,
        }
    }

    /// Process one inbound event end to end.
    ///
    /// Unresolvable or flooding turns are dropped (audited, `Ok`); durable
    /// storage failures bubble up so the transport can redeliver.
    pub async fn handle(&self, inbound: Inbound) -> Result<()> {
        let body = inbound.text.clone().unwrap_or_default();

        let user = match UserKey::normalize(&inbound.identifier) {
            Ok(u) => u,
            Err(e) => {
                let _ = self
                    .audit
                    .write(AuditEvent::unresolved(&inbound.identifier, &body));
                let _ = self.audit.write(AuditEvent::error(
                    &inbound.identifier,
                    &e.to_string(),
                    Some("normalize"),
                ));
                return Ok(());
            }
        };

        if !self.flood.lock().await.allow(&user) {
            let _ = self.audit.write(AuditEvent::flood_dropped(user.as_str()));
            return Ok(());
        }

        let tenant = match self.router.resolve(&user, &body).await? {
            Resolution::New { tenant } => tenant,
            Resolution::Existing {
                tenant,
                ignored_link,
            } => {
                if let Some(ignored) = ignored_link {
                    let key = LeadKey::new(tenant.clone(), user.clone());
                    let _ = self
                        .audit
                        .write(AuditEvent::identity_conflict(&key, ignored.as_str()));
                }
                tenant
            }
            Resolution::Unresolved => {
                let _ = self.audit.write(AuditEvent::unresolved(user.as_str(), &body));
                let reply = OutboundMessage::text(texts::use_your_link(self.cfg.default_language));
                if let Err(e) = self.outbound.send(&user, reply).await {
                    let _ = self.audit.write(AuditEvent::error(
                        user.as_str(),
                        &e.to_string(),
                        Some("unresolved reply"),
                    ));
                }
                return Ok(());
            }
        };

        let key = LeadKey::new(tenant, user);
        let _guard = self.locks.acquire(&key).await;

        // The user is talking again: any owed nudge is void.
        self.nudges.cancel(&key).await;

        let now = Utc::now();
        let lead = match self.repo.find(&key).await? {
            Some(l) => l,
            None => Lead::new(key.clone(), self.cfg.default_language, now),
        };

        let event = to_event(&inbound);

        // Divergent cached context? Offer a resume prompt instead of acting
        // on the message, unless this message *is* the resume answer.
        let is_resume_answer = matches!(
            event,
            Event::Action(Action::ResumeContinue) | Event::Action(Action::ResumeRestart)
        );
        if !is_resume_answer {
            let cached = self.context.get(&key).await;
            if let Some(prompt) = recovery::assess(&lead, cached.as_ref()) {
                let mut touched = lead.clone();
                touched.engagement.messages += 1;
                touched.last_interaction = now;
                scoring::rescore(&mut touched, now);
                touched.version = self.repo.save(&touched).await?;

                self.deliver(&key, &prompt, false).await;
                self.nudges.schedule(&key, touched.language).await;
                let _ = self.audit.write(AuditEvent::message(
                    &key,
                    state_name(&touched),
                    touched.score,
                    &body,
                    &prompt.text,
                ));
                return Ok(());
            }
        }

        // Compute-and-persist, retried once if a concurrent writer slipped
        // past the per-lead lock (e.g. an operator tool touching the lead).
        let mut attempts = 0;
        let (saved, transition) = loop {
            attempts += 1;
            let working = if attempts == 1 {
                lead.clone()
            } else {
                self.repo.find(&key).await?.ok_or_else(|| {
                    Error::EngineFault(format!("lead disappeared mid-turn: {key}"))
                })?
            };

            let transition = self.brain.process(&working, &event);

            let mut next = working;
            transition.apply_to(&mut next);
            next.engagement.messages += 1;
            if inbound.voice_note {
                next.engagement.voice_note = true;
            }
            if transition.effects.contains(&Effect::SendListings) {
                next.engagement.catalog_views += 1;
            }
            next.last_interaction = now;
            scoring::rescore(&mut next, now);

            match self.repo.save(&next).await {
                Ok(v) => {
                    next.version = v;
                    break (next, transition);
                }
                Err(Error::ConflictingWrite(_)) if attempts == 1 => continue,
                Err(Error::ConflictingWrite(k)) => {
                    return Err(Error::EngineFault(format!(
                        "write conflict persisted after retry for {k}"
                    )))
                }
                Err(e) => return Err(e),
            }
        };

        self.run_effects(&key, &saved, &transition).await;

        // Cache after the durable commit, best-effort.
        if saved.state.is_terminal() {
            self.context.invalidate(&key).await;
        } else {
            self.context.save(&key, &SessionContext::from(&saved)).await;
            self.nudges.schedule(&key, saved.language).await;
        }

        let _ = self.audit.write(AuditEvent::message(
            &key,
            state_name(&saved),
            saved.score,
            &body,
            &transition.reply.text,
        ));

        Ok(())
    }

    async fn run_effects(&self, key: &LeadKey, saved: &Lead, transition: &Transition) {
        for effect in &transition.effects {
            match effect {
                Effect::RequestContact => {
                    // The reply rides along as the contact-request prompt so
                    // the user gets one message, not two.
                    if let Err(e) = self
                        .outbound
                        .request_contact(&key.user, &transition.reply.text)
                        .await
                    {
                        let _ = self.audit.write(AuditEvent::error(
                            key.user.as_str(),
                            &e.to_string(),
                            Some("request_contact"),
                        ));
                    }
                }
                Effect::NotifyAgent => {
                    let _ = self.audit.write(AuditEvent::handoff(
                        key,
                        state_name(saved),
                        saved.handoff_note.as_deref(),
                    ));
                }
                Effect::SendListings => {} // catalog counter applied pre-commit
                Effect::ClearContext => self.context.invalidate(key).await,
            }
        }

        if !transition.effects.contains(&Effect::RequestContact) {
            self.deliver(key, &transition.reply, true).await;
        }
    }

    async fn deliver(&self, key: &LeadKey, reply: &OutboundMessage, log_failure: bool) {
        if let Err(e) = self.outbound.send(&key.user, reply.clone()).await {
            if log_failure {
                let _ = self.audit.write(AuditEvent::error(
                    key.user.as_str(),
                    &e.to_string(),
                    Some("send"),
                ));
            }
        }
    }
}

fn to_event(inbound: &Inbound) -> Event {
    if let Some(contact) = &inbound.contact {
        return Event::Contact {
            phone: contact.phone.clone(),
            name: contact.name.clone(),
        };
    }
    if let Some(action) = inbound.action {
        return Event::Action(action);
    }
    Event::Text(inbound.text.clone().unwrap_or_default())
}

fn state_name(lead: &Lead) -> &'static str {
    match lead.state {
        crate::lead::ConversationState::Start => "START",
        crate::lead::ConversationState::LanguageSelect => "LANGUAGE_SELECT",
        crate::lead::ConversationState::CollectingName => "COLLECTING_NAME",
        crate::lead::ConversationState::CaptureContact => "CAPTURE_CONTACT",
        crate::lead::ConversationState::Warmup => "WARMUP",
        crate::lead::ConversationState::SlotFilling => "SLOT_FILLING",
        crate::lead::ConversationState::ValueProposition => "VALUE_PROPOSITION",
        crate::lead::ConversationState::HardGate => "HARD_GATE",
        crate::lead::ConversationState::Engagement => "ENGAGEMENT",
        crate::lead::ConversationState::HandoffSchedule => "HANDOFF_SCHEDULE",
        crate::lead::ConversationState::HandoffUrgent => "HANDOFF_URGENT",
        crate::lead::ConversationState::Completed => "COMPLETED",
        crate::lead::ConversationState::Closed => "CLOSED",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::{sync::Mutex as StdMutex, time::Duration};

    use crate::domain::{Language, TenantId};
    use crate::lead::{BudgetRange, ConversationState, Purpose, Slot};
    use crate::memory::{MemoryLeadRepository, MemoryLockRepository, MemoryTtlStore};

    #[derive(Default)]
    struct FakeOutbound {
        sent: StdMutex<Vec<(UserKey, OutboundMessage)>>,
        contact_requests: StdMutex<Vec<(UserKey, String)>>,
    }

    impl FakeOutbound {
        fn sent_texts(&self) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .map(|(_, m)| m.text.clone())
                .collect()
        }

        fn last_message(&self) -> Option<OutboundMessage> {
            self.sent.lock().unwrap().last().map(|(_, m)| m.clone())
        }
    }

    #[async_trait]
    impl OutboundPort for FakeOutbound {
        async fn send(&self, user: &UserKey, message: OutboundMessage) -> Result<()> {
            self.sent.lock().unwrap().push((user.clone(), message));
            Ok(())
        }

        async fn request_contact(&self, user: &UserKey, prompt: &str) -> Result<()> {
            self.contact_requests
                .lock()
                .unwrap()
                .push((user.clone(), prompt.to_string()));
            Ok(())
        }
    }

    struct Harness {
        service: ConversationService,
        repo: Arc<MemoryLeadRepository>,
        lock_repo: Arc<MemoryLockRepository>,
        ttl: Arc<MemoryTtlStore>,
        outbound: Arc<FakeOutbound>,
    }

    fn test_config(flood_requests: Option<u32>) -> Arc<Config> {
        Arc::new(Config {
            telegram_bot_token: "x".to_string(),
            vertical: "realty".to_string(),
            default_language: Language::En,
            context_ttl: Duration::from_secs(24 * 3600),
            nudge_ttl: Duration::from_secs(600),
            nudge_delay: Duration::from_secs(600),
            audit_log_path: format!(
                "/tmp/lqb-service-test-{}-{:p}.log",
                std::process::id(),
                &flood_requests
            )
            .into(),
            audit_log_json: true,
            flood_enabled: flood_requests.is_some(),
            flood_requests: flood_requests.unwrap_or(20),
            flood_window: Duration::from_secs(60),
        })
    }

    fn harness(cfg: Arc<Config>) -> Harness {
        let repo = Arc::new(MemoryLeadRepository::new());
        let lock_repo = Arc::new(MemoryLockRepository::new());
        let ttl = Arc::new(MemoryTtlStore::new());
        let outbound = Arc::new(FakeOutbound::default());
        let service = ConversationService::new(
            cfg,
            repo.clone(),
            lock_repo.clone(),
            ttl.clone(),
            outbound.clone(),
        );
        Harness {
            service,
            repo,
            lock_repo,
            ttl,
            outbound,
        }
    }

    fn text_inbound(identifier: &str, text: &str) -> Inbound {
        Inbound {
            identifier: identifier.to_string(),
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn action_inbound(identifier: &str, action: Action) -> Inbound {
        Inbound {
            identifier: identifier.to_string(),
            action: Some(action),
            ..Default::default()
        }
    }

    fn key(tenant: &str, user: &str) -> LeadKey {
        LeadKey::new(
            TenantId(tenant.to_string()),
            UserKey::normalize(user).unwrap(),
        )
    }

    async fn seed_lead(h: &Harness, lead: &Lead) {
        h.lock_repo
            .create_if_absent(&lead.key.user, &lead.key.tenant)
            .await
            .unwrap();
        h.repo.save(lead).await.unwrap();
    }

    #[tokio::test]
    async fn first_deep_link_creates_the_lead_and_greets() {
        let h = harness(test_config(None));

        h.service
            .handle(text_inbound("998901112233@c.us", "start_realty_42"))
            .await
            .unwrap();

        let lead = h
            .repo
            .find(&key("42", "998901112233"))
            .await
            .unwrap()
            .expect("lead created");
        assert_eq!(lead.state, ConversationState::LanguageSelect);
        assert_eq!(lead.engagement.messages, 1);

        let greeting = h.outbound.last_message().expect("greeting sent");
        assert_eq!(greeting.buttons.len(), 2, "language buttons");
    }

    #[tokio::test]
    async fn unresolved_user_gets_generic_reply_and_no_lead() {
        let h = harness(test_config(None));

        h.service
            .handle(text_inbound("555000", "hello, anyone there?"))
            .await
            .unwrap();

        let texts = h.outbound.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("link"), "{}", texts[0]);
        assert_eq!(h.repo.find(&key("42", "555000")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn concurrent_turns_for_one_lead_lose_no_update() {
        let h = harness(test_config(None));
        let k = key("42", "777");
        let mut lead = Lead::new(k.clone(), Language::En, Utc::now());
        lead.state = ConversationState::SlotFilling;
        lead.slots.purpose = Some(Purpose::Live);
        lead.pending_slot = Some(Slot::Transaction);
        seed_lead(&h, &lead).await;

        let service = Arc::new(h.service);
        let a = {
            let service = service.clone();
            tokio::spawn(async move { service.handle(text_inbound("777", "rent")).await })
        };
        let b = {
            let service = service.clone();
            tokio::spawn(
                async move { service.handle(text_inbound("777", "3 bedrooms")).await },
            )
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let lead = h.repo.find(&k).await.unwrap().unwrap();
        assert!(lead.slots.transaction.is_some(), "transaction lost");
        assert_eq!(lead.slots.bedrooms, Some(3), "bedrooms lost");
        assert_eq!(lead.engagement.messages, 2);
    }

    #[tokio::test]
    async fn divergent_cache_triggers_resume_and_restart_keeps_durable_slots() {
        let h = harness(test_config(None));
        let k = key("42", "888");
        let mut lead = Lead::new(k.clone(), Language::En, Utc::now());
        lead.state = ConversationState::SlotFilling;
        lead.slots.budget = BudgetRange::new(Some(1_000_000), None);
        lead.pending_slot = Some(Slot::Location);
        seed_lead(&h, &lead).await;

        // Cached context is ahead of durable state.
        let cached = SessionContext {
            state: ConversationState::HardGate,
            slots: lead.slots.clone(),
            pending_slot: None,
            language: Language::En,
        };
        let ctxs = ContextStore::new(h.ttl.clone(), Duration::from_secs(3600));
        assert!(ctxs.save(&k, &cached).await);

        h.service
            .handle(text_inbound("888", "hi, I'm back"))
            .await
            .unwrap();

        let prompt = h.outbound.last_message().expect("resume prompt");
        assert!(prompt.text.contains("1000000"), "{}", prompt.text);
        assert_eq!(prompt.buttons.len(), 2);

        // Declining continues from durable truth and only drops the cache.
        h.service
            .handle(action_inbound("888", Action::ResumeRestart))
            .await
            .unwrap();

        let lead = h.repo.find(&k).await.unwrap().unwrap();
        assert_eq!(lead.slots.budget, BudgetRange::new(Some(1_000_000), None));
        assert_eq!(lead.state, ConversationState::SlotFilling);

        // The reply re-asks the pending question, the stale entry is gone
        // (replaced by a fresh snapshot of durable state).
        let reply = h.outbound.last_message().unwrap();
        assert!(reply.text.contains("area") || reply.text.contains("district"));
        assert_eq!(ctxs.get(&k).await.unwrap().state, ConversationState::SlotFilling);
    }

    #[tokio::test]
    async fn listings_effect_counts_a_catalog_view() {
        let h = harness(test_config(None));
        let k = key("42", "999");
        let mut lead = Lead::new(k.clone(), Language::En, Utc::now());
        lead.state = ConversationState::ValueProposition;
        lead.slots.purpose = Some(Purpose::Invest);
        lead.phone = Some("+998900000000".to_string());
        seed_lead(&h, &lead).await;

        h.service
            .handle(action_inbound("999", Action::ShowListings))
            .await
            .unwrap();

        let lead = h.repo.find(&k).await.unwrap().unwrap();
        assert_eq!(lead.state, ConversationState::Engagement);
        assert_eq!(lead.engagement.catalog_views, 1);
        assert!(lead.score > 0);
    }

    #[tokio::test]
    async fn hard_gate_asks_for_contact_via_native_ui() {
        let h = harness(test_config(None));
        let k = key("42", "1010");
        let mut lead = Lead::new(k.clone(), Language::En, Utc::now());
        lead.state = ConversationState::ValueProposition;
        lead.slots.purpose = Some(Purpose::Live);
        seed_lead(&h, &lead).await;

        h.service
            .handle(action_inbound("1010", Action::ShowListings))
            .await
            .unwrap();

        let requests = h.outbound.contact_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        // The prompt is the reply itself, not a second message.
        assert_eq!(h.outbound.sent.lock().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn flooding_user_is_dropped_after_the_limit() {
        let h = harness(test_config(Some(1)));
        let k = key("42", "2020");
        let lead = Lead::new(k.clone(), Language::En, Utc::now());
        seed_lead(&h, &lead).await;

        h.service.handle(text_inbound("2020", "one")).await.unwrap();
        h.service.handle(text_inbound("2020", "two")).await.unwrap();

        // Only the first turn produced output.
        assert_eq!(h.outbound.sent_texts().len(), 1);
        let lead = h.repo.find(&k).await.unwrap().unwrap();
        assert_eq!(lead.engagement.messages, 1);
    }
}
