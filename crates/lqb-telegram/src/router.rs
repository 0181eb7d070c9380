use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};

use lqb_core::{
    config::Config,
    messaging::port::OutboundPort,
    ports::{LeadRepository, LockRepository},
    service::ConversationService,
    store::TtlStore,
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConversationService>,
}

/// Long-polling entry point. Storage backends come from the caller so the
/// binary decides what is durable; the bot and messenger are built here.
pub async fn run_polling(
    cfg: Arc<Config>,
    repo: Arc<dyn LeadRepository>,
    locks: Arc<dyn LockRepository>,
    ttl: Arc<dyn TtlStore>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    // Basic startup info.
    if let Ok(me) = bot.get_me().await {
        println!("lqb started: @{}", me.username());
    }
    println!("Deep-link vertical: {}", cfg.vertical);
    println!("Default language: {}", cfg.default_language.code());

    let messenger: Arc<dyn OutboundPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let service = Arc::new(ConversationService::new(cfg, repo, locks, ttl, messenger));
    let state = Arc::new(AppState { service });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}
