//! In-memory implementations of the storage ports.
//!
//! These back the tests and the demo binary. Production deployments put a
//! relational store behind [`LeadRepository`]/[`LockRepository`] and a
//! networked cache behind [`TtlStore`]; the semantics to preserve are the
//! ones encoded here (versioned saves, atomic lock creation, per-key
//! expiry).

use std::{
    collections::{hash_map::Entry as MapEntry, HashMap},
    sync::Mutex,
    time::{Duration, Instant},
};

use async_trait::async_trait;

use crate::{
    domain::{LeadKey, TenantId, UserKey},
    errors::Error,
    lead::Lead,
    ports::{LeadRepository, LockOutcome, LockRepository},
    store::TtlStore,
    Result,
};

// === TTL store ===

struct TtlEntry {
    value: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryTtlStore {
    entries: Mutex<HashMap<String, TtlEntry>>,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock-injected variants: expiry is evaluated against the `now` the
    /// caller passes, so boundary behavior is testable without sleeping.
    pub fn set_at(&self, key: &str, value: &str, ttl: Duration, now: Instant) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            TtlEntry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
    }

    /// Expired exactly at the deadline: a value is returned strictly before
    /// `expires_at` and never at or after it.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if now < e.expires_at => Some(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

#[async_trait]
impl TtlStore for MemoryTtlStore {
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.set_at(key, value, ttl, Instant::now());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get_at(key, Instant::now()))
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.remove(key);
        Ok(())
    }
}

// === Lead repository ===

#[derive(Default)]
pub struct MemoryLeadRepository {
    leads: Mutex<HashMap<LeadKey, Lead>>,
}

impl MemoryLeadRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadRepository for MemoryLeadRepository {
    async fn find(&self, key: &LeadKey) -> Result<Option<Lead>> {
        Ok(self.leads.lock().unwrap().get(key).cloned())
    }

    async fn save(&self, lead: &Lead) -> Result<u64> {
        let mut leads = self.leads.lock().unwrap();
        let stored_version = leads.get(&lead.key).map(|l| l.version).unwrap_or(0);
        if stored_version != lead.version {
            return Err(Error::ConflictingWrite(lead.key.to_string()));
        }
        let mut next = lead.clone();
        next.version = lead.version + 1;
        let version = next.version;
        leads.insert(lead.key.clone(), next);
        Ok(version)
    }
}

// === Lock repository ===

#[derive(Default)]
pub struct MemoryLockRepository {
    locks: Mutex<HashMap<UserKey, TenantId>>,
}

impl MemoryLockRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LockRepository for MemoryLockRepository {
    async fn create_if_absent(&self, user: &UserKey, tenant: &TenantId) -> Result<LockOutcome> {
        let mut locks = self.locks.lock().unwrap();
        match locks.entry(user.clone()) {
            MapEntry::Occupied(e) => Ok(LockOutcome::Held(e.get().clone())),
            MapEntry::Vacant(e) => {
                e.insert(tenant.clone());
                Ok(LockOutcome::Created)
            }
        }
    }

    async fn get(&self, user: &UserKey) -> Result<Option<TenantId>> {
        Ok(self.locks.lock().unwrap().get(user).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::domain::Language;
    use chrono::Utc;

    #[test]
    fn ttl_boundary_is_exclusive_of_the_deadline() {
        let store = MemoryTtlStore::new();
        let t0 = Instant::now();
        let day = Duration::from_secs(24 * 3600);
        store.set_at("k", "v", day, t0);

        let just_before = t0 + day - Duration::from_millis(1);
        assert_eq!(store.get_at("k", just_before).as_deref(), Some("v"));

        store.set_at("k", "v", day, t0);
        assert_eq!(store.get_at("k", t0 + day), None);
        assert_eq!(store.get_at("k", t0 + day + Duration::from_secs(1)), None);
    }

    #[tokio::test]
    async fn versioned_save_detects_lost_update() {
        let repo = MemoryLeadRepository::new();
        let key = LeadKey::new(
            TenantId("1".to_string()),
            UserKey::normalize("u1").unwrap(),
        );
        let mut lead = Lead::new(key, Language::En, Utc::now());

        lead.version = repo.save(&lead).await.unwrap();
        assert_eq!(lead.version, 1);

        // A save from a stale snapshot must be rejected.
        let mut stale = lead.clone();
        stale.version = 0;
        assert!(matches!(
            repo.save(&stale).await,
            Err(Error::ConflictingWrite(_))
        ));

        lead.version = repo.save(&lead).await.unwrap();
        assert_eq!(lead.version, 2);
    }

    #[tokio::test]
    async fn concurrent_lock_creation_has_one_winner() {
        let locks = Arc::new(MemoryLockRepository::new());
        let user = UserKey::normalize("fresh-user").unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let locks = locks.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                locks
                    .create_if_absent(&user, &TenantId(format!("t{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut created = 0;
        for h in handles {
            if matches!(h.await.unwrap(), LockOutcome::Created) {
                created += 1;
            }
        }
        assert_eq!(created, 1);

        let winner = locks.get(&user).await.unwrap().unwrap();
        // Every later claim reports the same winner.
        match locks
            .create_if_absent(&user, &TenantId("late".to_string()))
            .await
            .unwrap()
        {
            LockOutcome::Held(t) => assert_eq!(t, winner),
            LockOutcome::Created => panic!("second create must not win"),
        }
    }
}
