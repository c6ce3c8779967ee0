use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::ChatAction;
use teloxide::utils::command::BotCommands;
use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{self, ChatCompletion};

pub const EMPTY_MESSAGE_REPLY: &str = "⚠️ You sent an empty message.";
pub const UNAUTHORIZED_REPLY: &str = "❌ You are not authorized to use this command.";
pub const BROADCAST_USAGE_REPLY: &str = "Usage: /broadcast <message>";
pub const BROADCAST_SENT_PREFIX: &str = "✅ Broadcast sent: ";
pub const STATS_REPLY: &str = "📊 Bot is running smoothly.";

/// Telegram rejects messages longer than 4096 characters.
const MAX_MESSAGE_LEN: usize = 4000;

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "say hello.")]
    Start,
    #[command(description = "(admin) announce a message.")]
    Broadcast(String),
    #[command(description = "(admin) show bot status.")]
    Stats,
}

/// Shared state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub llm: Arc<dyn ChatCompletion>,
}

impl AppState {
    pub fn new(config: Config, llm: Arc<dyn ChatCompletion>) -> Self {
        Self { config, llm }
    }
}

pub fn start_reply(name: &str) -> String {
    format!(
        "Hello {}! I'm your AI Community Bot 🤖\nSend me any message and I'll reply!",
        name
    )
}

/// Relays `text` to the model. Blank input never reaches the model.
pub async fn relay_reply(llm: &dyn ChatCompletion, text: &str) -> String {
    if text.trim().is_empty() {
        return EMPTY_MESSAGE_REPLY.to_string();
    }
    llm::generate_reply(llm, text).await
}

/// Echoes the broadcast back to the admin. Nothing is delivered to other chats.
pub fn broadcast_reply(config: &Config, caller_id: &str, args: &str) -> String {
    if !config.is_admin(caller_id) {
        return UNAUTHORIZED_REPLY.to_string();
    }
    let words: Vec<&str> = args.split_whitespace().collect();
    if words.is_empty() {
        return BROADCAST_USAGE_REPLY.to_string();
    }
    format!("{}{}", BROADCAST_SENT_PREFIX, words.join(" "))
}

pub fn stats_reply(config: &Config, caller_id: &str) -> String {
    if !config.is_admin(caller_id) {
        return UNAUTHORIZED_REPLY.to_string();
    }
    STATS_REPLY.to_string()
}

/// Start the Telegram bot
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.bot_token);

    info!("Starting Telegram bot...");

    if let Err(e) = bot.set_my_commands(Command::bot_commands()).await {
        warn!("Failed to register bot commands: {}", e);
    }

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| is_relayable(msg.text())).endpoint(handle_text),
        );

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("bot"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Plain text only; anything that looks like a command is left alone.
fn is_relayable(text: Option<&str>) -> bool {
    matches!(text, Some(t) if !t.starts_with('/'))
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let user = match msg.from.as_ref() {
        Some(user) => user,
        None => return Ok(()),
    };
    let caller_id = user.id.0.to_string();

    let reply = match cmd {
        Command::Start => {
            info!("/start from {} ({})", user.first_name, caller_id);
            start_reply(&user.first_name)
        }
        Command::Broadcast(args) => {
            info!("/broadcast from {}", caller_id);
            broadcast_reply(&state.config, &caller_id, &args)
        }
        Command::Stats => {
            info!("/stats from {}", caller_id);
            stats_reply(&state.config, &caller_id)
        }
    };

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn handle_text(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let text = match msg.text() {
        Some(t) => t,
        None => return Ok(()),
    };

    if let Some(user) = msg.from.as_ref() {
        info!("Message from {} ({}): {}", user.first_name, user.id.0, text);
    }

    if !text.trim().is_empty() {
        bot.send_chat_action(msg.chat.id, ChatAction::Typing)
            .await
            .ok();
    }

    let reply = relay_reply(state.llm.as_ref(), text).await;

    for chunk in split_message(&reply, MAX_MESSAGE_LEN) {
        bot.send_message(msg.chat.id, chunk).await?;
    }

    Ok(())
}

/// Breaks `text` into pieces of at most `max_len` bytes, preferring to cut
/// after a newline or space.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < text.len() {
        let mut end = (start + max_len).min(text.len());
        while end > start && !text.is_char_boundary(end) {
            end -= 1;
        }
        let cut = if end < text.len() {
            text[start..end]
                .rfind('\n')
                .or_else(|| text[start..end].rfind(' '))
                .map(|pos| start + pos + 1)
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(text[start..cut].to_string());
        start = cut;
    }

    chunks
}
