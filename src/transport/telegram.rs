//! Telegram Bot API transport.
//!
//! Long-polls `getUpdates` for commands and replies with `sendMessage`.
//! One session = one Telegram chat id. The token is part of the request path
//! and is never logged.

use super::{split_message, Notifier};
use crate::commands::CommandHandler;
use crate::logging::ellipse;
use crate::tasks::SessionId;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects messages longer than this (characters).
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// Server-side long-poll wait (seconds). The HTTP timeout must stay above it.
const LONG_POLL_SECS: u64 = 30;
const HTTP_TIMEOUT_SECS: u64 = 45;
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

pub struct TelegramClient {
    client: reqwest::Client,
    /// `https://api.telegram.org/bot<token>`
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        Self::with_base_url(format!("{}/bot{}", API_BASE, token))
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: serde_json::Value) -> Result<T> {
        let url = format!("{}/{}", self.base_url, method);
        let resp: ApiResponse<T> = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Telegram {} request failed", method))?
            .json()
            .await
            .with_context(|| format!("Telegram {} returned invalid JSON", method))?;

        if !resp.ok {
            return Err(anyhow!(
                "Telegram {} failed: {}",
                method,
                resp.description.unwrap_or_else(|| "unknown error".to_string())
            ));
        }
        resp.result
            .ok_or_else(|| anyhow!("Telegram {} returned no result", method))
    }

    /// Validate the token.
    pub async fn get_me(&self) -> Result<BotUser> {
        self.call("getMe", serde_json::json!({})).await
    }

    pub async fn get_updates(&self, offset: i64, timeout_secs: u64) -> Result<Vec<Update>> {
        self.call(
            "getUpdates",
            serde_json::json!({
                "offset": offset,
                "timeout": timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "sendMessage",
                serde_json::json!({
                    "chat_id": chat_id,
                    "text": text,
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send_text(&self, session: SessionId, text: &str) -> Result<()> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.send_message(session.0, &chunk).await?;
        }
        Ok(())
    }
}

/// Serve commands until the task is dropped. Each message is handled on its own
/// task so a slow fan-out probe never blocks other chats.
pub async fn run_polling(client: Arc<TelegramClient>, handler: CommandHandler) -> Result<()> {
    let me = client.get_me().await.context("Telegram token rejected")?;
    info!(
        "Telegram: Connected as @{} (id: {})",
        me.username.as_deref().unwrap_or("?"),
        me.id
    );

    let mut offset = 0;
    loop {
        let updates = match client.get_updates(offset, LONG_POLL_SECS).await {
            Ok(u) => u,
            Err(e) => {
                warn!("Telegram: getUpdates failed, retrying in {:?}: {:#}", RETRY_DELAY, e);
                tokio::time::sleep(RETRY_DELAY).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let session = SessionId(message.chat.id);
            debug!("Telegram: message in chat {}: {}", session, ellipse(&text, 200));

            let handler = handler.clone();
            tokio::spawn(async move {
                handler.dispatch(session, &text).await;
            });
        }
    }
}
