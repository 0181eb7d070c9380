use async_trait::async_trait;

use crate::{domain::UserKey, messaging::types::OutboundMessage, Result};

/// Cross-messenger outbound port.
///
/// Telegram is the first implementation; the shape is designed so a WhatsApp
/// adapter can fit behind the same interface. Adapters own retry/backoff for
/// transient transport failures and map platform errors to
/// [`crate::Error::Transport`].
#[async_trait]
pub trait OutboundPort: Send + Sync {
    async fn send(&self, user: &UserKey, message: OutboundMessage) -> Result<()>;

    /// Ask the platform for its native contact-share UI (phone number
    /// prompt). Platforms without one fall back to a plain text prompt.
    async fn request_contact(&self, user: &UserKey, prompt: &str) -> Result<()>;
}
