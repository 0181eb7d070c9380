//! Tenant resolution on a shared transport.
//!
//! Many tenant agencies share one bot identity, so an inbound user must be
//! pinned to exactly one tenant. The pin is created by the first successful
//! deep link and is permanent: later deep links to a different tenant are
//! reported (and audited by the caller) but never applied, otherwise one
//! tenant's broadcast link could hijack another tenant's customer.

use std::sync::Arc;

use crate::{
    deeplink::detect_deep_link,
    domain::{TenantId, UserKey},
    ports::{LockOutcome, LockRepository},
    Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// First contact: the deep link created the binding.
    New { tenant: TenantId },
    /// Known user. `ignored_link` carries the tenant of a conflicting deep
    /// link that lost to the existing binding, for the audit trail.
    Existing {
        tenant: TenantId,
        ignored_link: Option<TenantId>,
    },
    /// No binding and no deep link. The caller must not guess a tenant.
    Unresolved,
}

pub struct IdentityRouter {
    locks: Arc<dyn LockRepository>,
    vertical: String,
}

impl IdentityRouter {
    pub fn new(locks: Arc<dyn LockRepository>, vertical: impl Into<String>) -> Self {
        Self {
            locks,
            vertical: vertical.into(),
        }
    }

    /// Resolve the tenant for an inbound message.
    ///
    /// The binding is persisted before this returns, so a duplicate delivery
    /// of the same deep-link message resolves to the same tenant.
    pub async fn resolve(&self, user: &UserKey, body: &str) -> Result<Resolution> {
        let link = detect_deep_link(body).filter(|l| l.vertical == self.vertical);

        if let Some(link) = link {
            return match self.locks.create_if_absent(user, &link.tenant).await? {
                LockOutcome::Created => Ok(Resolution::New {
                    tenant: link.tenant,
                }),
                LockOutcome::Held(held) => {
                    let ignored_link = (held != link.tenant).then_some(link.tenant);
                    Ok(Resolution::Existing {
                        tenant: held,
                        ignored_link,
                    })
                }
            };
        }

        match self.locks.get(user).await? {
            Some(tenant) => Ok(Resolution::Existing {
                tenant,
                ignored_link: None,
            }),
            None => Ok(Resolution::Unresolved),
        }
    }
}
