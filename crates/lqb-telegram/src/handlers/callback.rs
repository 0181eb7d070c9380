use std::sync::Arc;

use teloxide::prelude::*;

use lqb_core::{messaging::types::Action, service::Inbound};

use crate::router::AppState;

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let cb_id = q.id.clone();
    let chat_id = q.message.as_ref().map(|m| m.chat.id);
    let data = q.data.clone().unwrap_or_default();

    // Always answer the callback so the client stops its spinner.
    let Some(chat_id) = chat_id else {
        let _ = bot.answer_callback_query(cb_id).await;
        return Ok(());
    };

    let Some(action) = Action::decode(&data) else {
        let _ = bot
            .answer_callback_query(cb_id)
            .text("This button has expired".to_string())
            .await;
        return Ok(());
    };

    let _ = bot.answer_callback_query(cb_id).await;

    let inbound = Inbound {
        identifier: chat_id.0.to_string(),
        text: None,
        action: Some(action),
        contact: None,
        voice_note: false,
    };

    if let Err(e) = state.service.handle(inbound).await {
        eprintln!("[LQB] callback turn failed for chat {}: {e}", chat_id.0);
        let _ = bot
            .send_message(chat_id, "Something went wrong, please try again.")
            .await;
    }

    Ok(())
}
