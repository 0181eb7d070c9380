use serde::{Deserialize, Serialize};

use crate::{errors::Error, Result};

/// Tenant (agency) identifier.
///
/// Numeric for most agencies, an opaque agent token for white-label partners,
/// so it stays a string end to end.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized transport-level user identifier (phone number or chat id).
///
/// The transport is shared across tenants, so this alone never identifies a
/// conversation; see [`LeadKey`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserKey(String);

impl UserKey {
    /// Normalize a raw transport identifier.
    ///
    /// WhatsApp ids carry an `@c.us`/`@s.whatsapp.net` suffix; Telegram chat
    /// ids are bare numbers. We strip the suffix, lowercase, and reject
    /// anything that ends up empty or non-identifier-like.
    pub fn normalize(raw: &str) -> Result<Self> {
        let bare = raw.trim().split('@').next().unwrap_or("").to_lowercase();
        if bare.is_empty() {
            return Err(Error::UnresolvedIdentity(format!(
                "empty identifier after normalization: {raw:?}"
            )));
        }
        if !bare
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '+')
        {
            return Err(Error::UnresolvedIdentity(format!(
                "malformed identifier: {raw:?}"
            )));
        }
        Ok(Self(bare))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Composite key for one qualification conversation: one lead per
/// (tenant, end-user) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadKey {
    pub tenant: TenantId,
    pub user: UserKey,
}

impl LeadKey {
    pub fn new(tenant: TenantId, user: UserKey) -> Self {
        Self { tenant, user }
    }
}

impl std::fmt::Display for LeadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tenant, self.user)
    }
}

/// Conversation language, chosen in the language-select step and persisted
/// on the lead.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ru,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ru => "ru",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_lowercase().as_str() {
            "en" => Some(Language::En),
            "ru" => Some(Language::Ru),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_key_strips_platform_suffix() {
        let k = UserKey::normalize("998901234567@c.us").unwrap();
        assert_eq!(k.as_str(), "998901234567");
    }

    #[test]
    fn user_key_rejects_empty_and_garbage() {
        assert!(UserKey::normalize("").is_err());
        assert!(UserKey::normalize("   ").is_err());
        assert!(UserKey::normalize("@c.us").is_err());
        assert!(UserKey::normalize("user id with spaces").is_err());
    }

    #[test]
    fn user_key_keeps_plain_chat_ids() {
        let k = UserKey::normalize("123456789").unwrap();
        assert_eq!(k.as_str(), "123456789");
    }
}
