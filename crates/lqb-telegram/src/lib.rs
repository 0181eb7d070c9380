//! Telegram adapter (teloxide).
//!
//! This crate implements the `lqb-core` OutboundPort over the Telegram Bot
//! API and feeds normalized inbound updates into the conversation service.
//! Platform markup (inline keyboards, the native contact-share button) is
//! rendered here; the core only ever sees abstract button sets.

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{
        ButtonRequest, InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton,
        KeyboardMarkup,
    },
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use lqb_core::{
    domain::UserKey,
    errors::Error,
    messaging::{port::OutboundPort, types::OutboundMessage},
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(user: &UserKey) -> Result<teloxide::types::ChatId> {
        user.as_str()
            .parse::<i64>()
            .map(teloxide::types::ChatId)
            .map_err(|_| Error::Transport(format!("non-numeric telegram chat id: {user}")))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::Transport(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl OutboundPort for TelegramMessenger {
    async fn send(&self, user: &UserKey, message: OutboundMessage) -> Result<()> {
        let chat = Self::tg_chat(user)?;

        if message.buttons.is_empty() {
            self.with_retry(|| self.bot.send_message(chat, message.text.clone()))
                .await?;
            return Ok(());
        }

        let rows: Vec<Vec<InlineKeyboardButton>> = message
            .buttons
            .iter()
            .map(|b| vec![InlineKeyboardButton::callback(b.label.clone(), b.action.encode())])
            .collect();
        let markup = InlineKeyboardMarkup::new(rows);

        self.with_retry(|| {
            self.bot
                .send_message(chat, message.text.clone())
                .reply_markup(markup.clone())
        })
        .await?;
        Ok(())
    }

    async fn request_contact(&self, user: &UserKey, prompt: &str) -> Result<()> {
        let chat = Self::tg_chat(user)?;

        let keyboard = KeyboardMarkup::new(vec![vec![
            KeyboardButton::new("📱 Share contact").request(ButtonRequest::Contact),
        ]])
        .resize_keyboard(true)
        .one_time_keyboard(true);

        self.with_retry(|| {
            self.bot
                .send_message(chat, prompt.to_string())
                .reply_markup(keyboard.clone())
        })
        .await?;
        Ok(())
    }
}
