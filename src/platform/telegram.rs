use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use teloxide::payloads::{AnswerCallbackQuerySetters, SendMessageSetters};
use teloxide::prelude::*;
use teloxide::types::{
    CallbackQuery, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode, UpdateKind,
    User,
};
use tracing::{debug, error, info, warn};

use crate::platform::{
    AdminCard, CallbackFeedback, ContentKind, IncomingCallback, IncomingMessage, Messenger, Sender,
};
use crate::relay::commands::{CallbackAction, QuickReply};
use crate::relay::Relay;
use crate::server::UpdateHandler;

/// `Messenger` backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Messenger for TelegramMessenger {
    async fn send_html(&self, chat_id: i64, html: &str, card: Option<AdminCard>) -> Result<()> {
        let request = |markup: Option<InlineKeyboardMarkup>| {
            let base = self
                .bot
                .send_message(ChatId(chat_id), html)
                .parse_mode(ParseMode::Html);
            match markup {
                Some(markup) => base.reply_markup(markup),
                None => base,
            }
        };

        let sent = match card {
            Some(card) => match request(Some(admin_card_keyboard(card, true))).await {
                Err(e) if privacy_restricted(&e.to_string()) => {
                    warn!(
                        "User {} hides their profile, sending card without chat link",
                        card.user_id
                    );
                    request(Some(admin_card_keyboard(card, false))).await
                }
                other => other,
            },
            None => request(None).await,
        };
        sent.with_context(|| format!("sendMessage to {} failed", chat_id))?;
        Ok(())
    }

    async fn send_plain(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .with_context(|| format!("sendMessage to {} failed", chat_id))?;
        Ok(())
    }

    async fn copy_message(&self, to_chat: i64, from_chat: i64, message_id: i32) -> Result<()> {
        self.bot
            .copy_message(ChatId(to_chat), ChatId(from_chat), MessageId(message_id))
            .await
            .with_context(|| format!("copyMessage to {} failed", to_chat))?;
        Ok(())
    }
}

/// Telegram refuses `tg://user` buttons for users whose privacy settings hide
/// their profile.
fn privacy_restricted(error: &str) -> bool {
    error.contains("BUTTON_USER_PRIVACY_RESTRICTED")
}

/// Buttons under every admin notification.
pub fn admin_card_keyboard(card: AdminCard, with_chat_link: bool) -> InlineKeyboardMarkup {
    let uid = card.user_id;
    let mut first_row = vec![InlineKeyboardButton::callback(
        "Answer (set target)",
        CallbackAction::SetTarget(uid).encode(),
    )];
    if with_chat_link {
        match reqwest::Url::parse(&format!("tg://user?id={uid}")) {
            Ok(url) => first_row.push(InlineKeyboardButton::url("Open chat", url)),
            Err(e) => warn!("Could not build chat link for {}: {}", uid, e),
        }
    }

    InlineKeyboardMarkup::new(vec![
        first_row,
        vec![
            InlineKeyboardButton::callback(
                "Quick: Thanks",
                CallbackAction::Quick(QuickReply::Thanks, uid).encode(),
            ),
            InlineKeyboardButton::callback(
                "Quick: On it",
                CallbackAction::Quick(QuickReply::OnIt, uid).encode(),
            ),
        ],
    ])
}

fn sender_of(user: &User) -> Sender {
    Sender {
        id: user.id.0 as i64,
        full_name: user.full_name(),
        username: user.username.clone(),
    }
}

fn content_kind(msg: &Message) -> ContentKind {
    if msg.text().is_some() {
        ContentKind::Text
    } else if msg.photo().is_some() {
        ContentKind::Photo
    } else if msg.animation().is_some() {
        ContentKind::Animation
    } else if msg.video().is_some() {
        ContentKind::Video
    } else if msg.document().is_some() {
        ContentKind::Document
    } else if msg.audio().is_some() {
        ContentKind::Audio
    } else if msg.voice().is_some() {
        ContentKind::Voice
    } else if msg.video_note().is_some() {
        ContentKind::VideoNote
    } else if msg.sticker().is_some() {
        ContentKind::Sticker
    } else if msg.contact().is_some() {
        ContentKind::Contact
    } else if msg.venue().is_some() {
        ContentKind::Venue
    } else if msg.location().is_some() {
        ContentKind::Location
    } else if msg.poll().is_some() {
        ContentKind::Poll
    } else if msg.dice().is_some() {
        ContentKind::Dice
    } else {
        ContentKind::Other
    }
}

/// Convert a Telegram message; messages without a sender (channel posts) are skipped.
pub fn incoming_message(msg: &Message) -> Option<IncomingMessage> {
    let user = msg.from.as_ref()?;
    let kind = content_kind(msg);
    let text = msg.text().or_else(|| msg.caption()).map(str::to_string);

    Some(IncomingMessage {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        sender: sender_of(user),
        kind,
        text,
        received_at: Utc::now(),
    })
}

pub fn incoming_callback(query: &CallbackQuery) -> Option<IncomingCallback> {
    Some(IncomingCallback {
        sender: sender_of(&query.from),
        data: query.data.clone()?,
        received_at: Utc::now(),
    })
}

/// Feeds webhook updates from Telegram into the relay.
pub struct TelegramUpdates {
    bot: Bot,
    relay: Arc<Relay>,
}

impl TelegramUpdates {
    pub fn new(bot: Bot, relay: Arc<Relay>) -> Self {
        Self { bot, relay }
    }

    /// What to show the presser. Queries without data get a silent answer.
    async fn feedback_for(&self, query: &CallbackQuery) -> CallbackFeedback {
        match incoming_callback(query) {
            Some(callback) => self.relay.handle_callback(&callback).await,
            None => CallbackFeedback::silent(),
        }
    }

    async fn handle_callback_query(&self, query: CallbackQuery) -> Result<()> {
        let feedback = self.feedback_for(&query).await;

        let mut answer = self.bot.answer_callback_query(query.id.clone());
        if let Some(text) = feedback.text {
            answer = answer.text(text).show_alert(feedback.alert);
        }
        answer.await.context("answerCallbackQuery failed")?;
        Ok(())
    }
}

#[async_trait]
impl UpdateHandler for TelegramUpdates {
    async fn handle_update(&self, update: Update) -> Result<()> {
        match update.kind {
            UpdateKind::Message(msg) => match incoming_message(&msg) {
                Some(incoming) => {
                    debug!(
                        "Telegram {} from {} ({})",
                        incoming.kind.as_str(),
                        incoming.sender.full_name,
                        incoming.sender.id
                    );
                    self.relay.handle_message(&incoming).await
                }
                None => Ok(()),
            },
            UpdateKind::CallbackQuery(query) => self.handle_callback_query(query).await,
            _ => {
                debug!("Ignoring update {:?}", update.id);
                Ok(())
            }
        }
    }
}

/// Point Telegram at `url`, replacing any other registered webhook.
pub async fn register_webhook(bot: &Bot, url: &str) -> Result<()> {
    let url = reqwest::Url::parse(url).with_context(|| format!("Invalid webhook URL: {}", url))?;
    let info = bot
        .get_webhook_info()
        .await
        .context("getWebhookInfo failed")?;

    if info.url.as_ref().map(|u| u.as_str()) == Some(url.as_str()) {
        info!("Webhook already set to: {}", url);
        return Ok(());
    }

    info!("Deleting old webhook...");
    bot.delete_webhook().await.context("deleteWebhook failed")?;
    info!("Setting new webhook: {}", url);
    bot.set_webhook(url).await.context("setWebhook failed")?;
    info!("Webhook successfully set");
    Ok(())
}

pub async fn remove_webhook(bot: &Bot) {
    match bot.delete_webhook().await {
        Ok(_) => info!("Webhook removed"),
        Err(e) => error!("Failed to remove webhook: {}", e),
    }
}
