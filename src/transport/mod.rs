//! Chat transports.
//!
//! The monitor core only ever sends plain text to a session. Each transport
//! receives commands, hands them to [`crate::commands::CommandHandler`] and
//! implements [`Notifier`] for the replies, alerts and digests.

pub mod discord;
pub mod telegram;

use crate::tasks::SessionId;
use anyhow::Result;
use async_trait::async_trait;

/// Outbound "send text to session".
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, session: SessionId, text: &str) -> Result<()>;
}

/// Which chat service to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportKind {
    Telegram,
    Discord,
}

impl TransportKind {
    /// Environment / `.env` key holding the bot token.
    pub fn token_key(self) -> &'static str {
        match self {
            TransportKind::Telegram => "TELEGRAM_TOKEN",
            TransportKind::Discord => "DISCORD_BOT_TOKEN",
        }
    }
}

/// Split `text` into chunks of at most `max_chars` characters, breaking on line
/// boundaries where possible. Lines longer than the limit are hard-split.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
