//! Discord Gateway transport.
//!
//! Connects as a bot, listens for DMs and @mentions, and hands the message text
//! (with the mention stripped) to the command handler. One session = one
//! Discord channel. Token is never logged.

use super::{split_message, Notifier};
use crate::commands::CommandHandler;
use crate::logging::ellipse;
use crate::tasks::SessionId;
use anyhow::{anyhow, Context as _, Result};
use async_trait::async_trait;
use serenity::client::{Client, Context, EventHandler};
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::id::{ChannelId, UserId};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

/// Discord rejects messages longer than this (characters).
pub const MAX_MESSAGE_CHARS: usize = 2000;

/// Channel id as a session key.
pub fn session_for_channel(channel_id: u64) -> Result<SessionId> {
    i64::try_from(channel_id)
        .map(SessionId)
        .map_err(|_| anyhow!("Discord channel id {} out of session range", channel_id))
}

/// Session key back to a channel id.
pub fn channel_for_session(session: SessionId) -> Result<ChannelId> {
    match u64::try_from(session.0) {
        Ok(id) if id != 0 => Ok(ChannelId::new(id)),
        _ => Err(anyhow!("Session {} is not a Discord channel", session)),
    }
}

/// Remove `<@id>` / `<@!id>` mentions of the bot from message content.
pub fn strip_mention(content: &str, bot_id: u64) -> String {
    content
        .replace(&format!("<@{}>", bot_id), "")
        .replace(&format!("<@!{}>", bot_id), "")
        .trim()
        .to_string()
}

/// Sends through the REST API; independent of the gateway connection.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            http: Arc::new(Http::new(token)),
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send_text(&self, session: SessionId, text: &str) -> Result<()> {
        let channel = channel_for_session(session)?;
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            channel
                .say(&*self.http, chunk)
                .await
                .context("Discord: Failed to send message")?;
        }
        Ok(())
    }
}

struct Handler {
    commands: CommandHandler,
    /// Bot user id (set on Ready, used to filter self and mentions).
    bot_user_id: OnceLock<UserId>,
}

#[serenity::async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, data_about_bot: Ready) {
        let id = data_about_bot.user.id;
        let _ = self.bot_user_id.set(id);
        info!("Discord: Bot connected as {} (id: {})", data_about_bot.user.name, id);
    }

    async fn message(&self, _ctx: Context, new_message: Message) {
        let Some(bot_id) = self.bot_user_id.get().copied() else {
            debug!("Discord: Ignoring message (bot id not set yet)");
            return;
        };

        if new_message.author.id == bot_id || new_message.author.bot {
            return;
        }

        // Respond only to DMs or when we are mentioned
        let is_dm = new_message.guild_id.is_none();
        let mentions_bot = new_message.mentions.iter().any(|u| u.id == bot_id);
        if !is_dm && !mentions_bot {
            return;
        }

        let content = strip_mention(&new_message.content, bot_id.get());
        if content.is_empty() {
            return;
        }

        let session = match session_for_channel(new_message.channel_id.get()) {
            Ok(s) => s,
            Err(e) => {
                debug!("Discord: {}", e);
                return;
            }
        };
        debug!(
            "Discord: {} from {} (channel {}): {}",
            if is_dm { "DM" } else { "mention" },
            new_message.author.name,
            new_message.channel_id,
            ellipse(&content, 200)
        );

        self.commands.dispatch(session, &content).await;
    }
}

/// Run the Discord gateway until it stops. Token must be non-empty.
pub async fn run_gateway(token: &str, commands: CommandHandler) -> Result<()> {
    if token.trim().is_empty() {
        return Err(anyhow!("Discord token is empty"));
    }

    info!("Discord: Connecting to Discord Gateway…");
    let intents =
        GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let handler = Handler {
        commands,
        bot_user_id: OnceLock::new(),
    };
    let mut client = Client::builder(token, intents)
        .event_handler(handler)
        .await
        .context("Discord client build failed")?;

    client.start().await.context("Discord gateway error")?;
    Ok(())
}
