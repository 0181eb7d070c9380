//! Deep-link detection.
//!
//! Tenants distribute pre-formatted start payloads of the form
//! `start_<vertical>_<tenant_id>` (QR codes, ad links, broadcast messages).
//! The payload is split on the first two underscores only, so tenant ids may
//! themselves contain underscores.

use crate::domain::TenantId;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeepLink {
    pub vertical: String,
    pub tenant: TenantId,
}

/// Recognize a deep-link payload in a message body.
///
/// Case-insensitive on the `start` prefix and the vertical token; the tenant
/// id is kept verbatim apart from trimming. Returns `None` for anything that
/// is not a well-formed payload (missing prefix, empty vertical or id,
/// unexpected characters).
pub fn detect_deep_link(body: &str) -> Option<DeepLink> {
    let token = body.trim().split_whitespace().next()?;

    let mut parts = token.splitn(3, '_');
    let prefix = parts.next()?;
    if !prefix.eq_ignore_ascii_case("start") {
        return None;
    }

    let vertical = parts.next()?.to_lowercase();
    if vertical.is_empty() || !vertical.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let id = parts.next()?;
    if id.is_empty()
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }

    Some(DeepLink {
        vertical,
        tenant: TenantId(id.to_string()),
    })
}
