pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Who sent an incoming message or pressed a button.
#[derive(Debug, Clone)]
pub struct Sender {
    pub id: i64,
    pub full_name: String,
    pub username: Option<String>,
}

/// Content category of a message, as written to the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Animation,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
    Contact,
    Location,
    Venue,
    Poll,
    Dice,
    Other,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
            ContentKind::Animation => "animation",
            ContentKind::Document => "document",
            ContentKind::Audio => "audio",
            ContentKind::Voice => "voice",
            ContentKind::VideoNote => "video_note",
            ContentKind::Sticker => "sticker",
            ContentKind::Contact => "contact",
            ContentKind::Location => "location",
            ContentKind::Venue => "venue",
            ContentKind::Poll => "poll",
            ContentKind::Dice => "dice",
            ContentKind::Other => "media",
        }
    }
}

/// A message received from the chat platform
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message_id: i32,
    /// Chat the message arrived in (the sender's private chat for this bot)
    pub chat_id: i64,
    pub sender: Sender,
    pub kind: ContentKind,
    /// Message text, or the caption for media
    pub text: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn is_text(&self) -> bool {
        self.kind == ContentKind::Text
    }
}

/// An inline button press
#[derive(Debug, Clone)]
pub struct IncomingCallback {
    pub sender: Sender,
    pub data: String,
    pub received_at: DateTime<Utc>,
}

/// Reply shown to whoever pressed an inline button.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackFeedback {
    pub text: Option<String>,
    pub alert: bool,
}

impl CallbackFeedback {
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            alert: false,
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            alert: true,
        }
    }
}

/// Action buttons attached to an admin notification about `user_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminCard {
    pub user_id: i64,
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send an HTML-formatted message, optionally with the admin action card.
    async fn send_html(&self, chat_id: i64, html: &str, card: Option<AdminCard>) -> Result<()>;

    /// Send text verbatim, without any markup parsing.
    async fn send_plain(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Copy an existing message (any media type) into another chat.
    async fn copy_message(&self, to_chat: i64, from_chat: i64, message_id: i32) -> Result<()>;
}
