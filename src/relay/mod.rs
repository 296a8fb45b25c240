pub mod commands;
pub mod format;
pub mod session;
pub mod spam;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, error, info};

use crate::audit::{AuditLog, Direction, LogRecord};
use crate::config::RelayConfig;
use crate::platform::{AdminCard, IncomingMessage, Messenger};

use self::commands::Command;
use self::session::{AdminSession, Visitors};
use self::spam::SpamGate;

/// Routes messages between users and the single admin.
pub struct Relay {
    admin_id: i64,
    config: RelayConfig,
    messenger: Arc<dyn Messenger>,
    audit_log: AuditLog,
    pub session: AdminSession,
    pub visitors: Visitors,
    spam: SpamGate,
}

impl Relay {
    pub fn new(
        admin_id: i64,
        config: RelayConfig,
        messenger: Arc<dyn Messenger>,
        audit_log: AuditLog,
    ) -> Self {
        let cooldown = TimeDelta::milliseconds(config.cooldown_ms as i64);
        Self {
            admin_id,
            config,
            messenger,
            audit_log,
            session: AdminSession::new(),
            visitors: Visitors::new(),
            spam: SpamGate::new(cooldown),
        }
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        user_id == self.admin_id
    }

    /// Entry point for every incoming chat message.
    pub async fn handle_message(&self, msg: &IncomingMessage) -> Result<()> {
        if msg.is_text() {
            if let Some(command) = msg.text.as_deref().and_then(Command::parse) {
                return self.handle_command(command, msg).await;
            }
        }

        if self.is_admin(msg.sender.id) {
            match self.session.target().await {
                Some(target) => self.relay_to_target(msg, target).await,
                None => {
                    debug!("Admin message with no active target, nothing to do");
                    Ok(())
                }
            }
        } else {
            self.notify_admin(msg).await
        }
    }

    /// Deliver an admin message to the current target, preserving its type.
    async fn relay_to_target(&self, msg: &IncomingMessage, target: i64) -> Result<()> {
        let sent = if msg.is_text() {
            let text = msg.text.as_deref().unwrap_or_default();
            self.messenger.send_plain(target, text).await
        } else {
            self.messenger
                .copy_message(target, msg.chat_id, msg.message_id)
                .await
        };

        match sent {
            Ok(()) => {
                self.audit(
                    msg.received_at,
                    Direction::Out,
                    target,
                    "admin",
                    msg.kind.as_str(),
                    msg.text.as_deref().unwrap_or_default(),
                )
                .await;
                info!("Relayed admin {} to target {}", msg.kind.as_str(), target);
                self.messenger
                    .send_plain(msg.chat_id, format::SENT_TO_TARGET)
                    .await
            }
            Err(e) => {
                error!("Failed to relay admin message to {}: {:#}", target, e);
                self.messenger
                    .send_html(msg.chat_id, &format::failed(&e), None)
                    .await
            }
        }
    }

    /// Forward a user's message to the admin and acknowledge it.
    async fn notify_admin(&self, msg: &IncomingMessage) -> Result<()> {
        let sender = &msg.sender;
        if !self.spam.allow(sender.id, msg.received_at).await {
            debug!("Dropping rapid message from {}", sender.id);
            return Ok(());
        }

        let is_new_today = self
            .visitors
            .touch(
                sender.id,
                &sender.full_name,
                sender.username.as_deref(),
                msg.received_at,
            )
            .await;

        let mut forwarded = self.send_summary(msg, is_new_today).await;
        if forwarded.is_ok() && !msg.is_text() {
            forwarded = self
                .messenger
                .copy_message(self.admin_id, msg.chat_id, msg.message_id)
                .await;
        }

        self.audit(
            msg.received_at,
            Direction::In,
            sender.id,
            &sender.full_name,
            msg.kind.as_str(),
            msg.text.as_deref().unwrap_or_default(),
        )
        .await;

        match forwarded {
            Ok(()) => {
                info!(
                    "Forwarded {} from user {} ({}) to admin",
                    msg.kind.as_str(),
                    sender.id,
                    sender.full_name
                );
                self.messenger
                    .send_plain(msg.chat_id, format::RECEIVED_ACK)
                    .await
            }
            Err(e) => {
                error!("Error forwarding message to admin: {:#}", e);
                self.messenger
                    .send_plain(msg.chat_id, format::FORWARD_FAILED)
                    .await
            }
        }
    }

    /// Send the admin notification with its card. Text too long to sit under
    /// the header goes out afterwards as plain chunks.
    async fn send_summary(&self, msg: &IncomingMessage, is_new_today: bool) -> Result<()> {
        let card = Some(AdminCard {
            user_id: msg.sender.id,
        });
        let summary = format::admin_summary(msg, is_new_today);
        if summary.chars().count() <= format::MAX_MESSAGE_CHARS {
            return self.messenger.send_html(self.admin_id, &summary, card).await;
        }

        let header = format::admin_header_for_long_text(msg, is_new_today);
        self.messenger.send_html(self.admin_id, &header, card).await?;
        let text = msg.text.as_deref().unwrap_or_default();
        for chunk in format::split_message(text, format::MAX_MESSAGE_CHARS) {
            self.messenger.send_plain(self.admin_id, &chunk).await?;
        }
        Ok(())
    }

    /// Append to the audit log. A failed write is logged, never propagated.
    async fn audit(
        &self,
        at: DateTime<Utc>,
        direction: Direction,
        user_id: i64,
        name: &str,
        content_type: &str,
        text: &str,
    ) {
        let record = LogRecord {
            epoch: at.timestamp(),
            direction,
            user_id,
            name: name.to_string(),
            content_type: content_type.to_string(),
            text: text.to_string(),
        };
        if let Err(e) = self.audit_log.append(&record).await {
            error!("Failed to write audit record: {:#}", e);
        }
    }
}
