//! Storage ports.
//!
//! The durable lead store and the identity-lock table are integration
//! points; production backends live in adapter crates, the in-memory
//! implementations in [`crate::memory`] back the tests and the demo binary.

use async_trait::async_trait;

use crate::{
    domain::{LeadKey, TenantId, UserKey},
    lead::Lead,
    Result,
};

/// Durable storage for [`Lead`] records, keyed by (tenant, user) with a
/// uniqueness constraint on that composite key.
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn find(&self, key: &LeadKey) -> Result<Option<Lead>>;

    /// Versioned upsert. The stored version must equal `lead.version`
    /// (0 for a new record); on success the new version is returned and the
    /// caller stores it back. A mismatch is `Error::ConflictingWrite`;
    /// per-lead serialization should prevent it, and the caller retries
    /// once against reloaded state before giving up.
    async fn save(&self, lead: &Lead) -> Result<u64>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// The caller's tenant won the binding.
    Created,
    /// Somebody already holds the binding (possibly the same tenant).
    Held(TenantId),
}

/// Permanent user-to-tenant bindings. No TTL: the binding lives as long as
/// the relationship.
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Atomic check-then-set. Two concurrent calls for the same fresh user
    /// must agree on a single winner; implementations back this with a
    /// conditional write (`INSERT .. ON CONFLICT DO NOTHING`, `SETNX`),
    /// never a separate read followed by a write.
    async fn create_if_absent(&self, user: &UserKey, tenant: &TenantId) -> Result<LockOutcome>;

    async fn get(&self, user: &UserKey) -> Result<Option<TenantId>>;
}
