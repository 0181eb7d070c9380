use std::sync::Arc;

use teloxide::prelude::*;

use lqb_core::service::{ContactShare, Inbound};

use crate::router::AppState;

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let identifier = msg.chat.id.0.to_string();

    let text = msg.text().map(normalize_start_command);
    let contact = msg.contact().map(|c| ContactShare {
        phone: c.phone_number.clone(),
        name: non_empty(&c.first_name),
    });
    let voice_note = msg.voice().is_some();

    // Stickers, photos and the like carry no qualification signal.
    if text.is_none() && contact.is_none() && !voice_note {
        return Ok(());
    }

    let inbound = Inbound {
        identifier,
        text,
        action: None,
        contact,
        voice_note,
    };

    if let Err(e) = state.service.handle(inbound).await {
        eprintln!("[LQB] turn failed for chat {}: {e}", msg.chat.id.0);
        let _ = bot
            .send_message(msg.chat.id, "Something went wrong, please try again.")
            .await;
    }

    Ok(())
}

/// Telegram delivers deep links as `/start <payload>`. Fold the payload back
/// into the canonical `start_<vertical>_<tenant>` body the identity router
/// parses; a bare `/start` stays an empty body (no deep link).
fn normalize_start_command(text: &str) -> String {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("/start") else {
        return t.to_string();
    };

    let payload = rest.trim();
    if payload.is_empty() {
        return String::new();
    }
    if payload.starts_with("start_") {
        payload.to_string()
    } else {
        format!("start_{payload}")
    }
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}
