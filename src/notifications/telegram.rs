//! Telegram Bot API sink
//!
//! The session's `user_id` is the Telegram chat id.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Notifier;
use crate::logger::{self, LogTag};

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct TelegramResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str) -> Result<Self, String> {
        if bot_token.is_empty() {
            return Err("Bot token is empty".to_string());
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
        })
    }

    pub async fn send_message(&self, chat_id: &str, message: &str) -> Result<(), String> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessageRequest {
                chat_id,
                text: message,
                disable_web_page_preview: true,
            })
            .send()
            .await
            .map_err(|e| format!("Failed to send Telegram message: {}", e))?;

        let body: TelegramResponse = response
            .json()
            .await
            .map_err(|e| format!("Invalid Telegram response: {}", e))?;

        if !body.ok {
            return Err(format!(
                "Telegram refused message: {}",
                body.description.unwrap_or_default()
            ));
        }

        logger::debug(
            LogTag::Notify,
            &format!("Sent Telegram notification (length={})", message.len()),
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, user_id: &str, message: &str) {
        if let Err(e) = self.send_message(user_id, message).await {
            logger::warning(LogTag::Notify, &e);
        }
    }
}
