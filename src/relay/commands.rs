use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::audit::Direction;
use crate::platform::{CallbackFeedback, IncomingCallback, IncomingMessage};
use crate::relay::format;
use crate::relay::Relay;

static REPLY_ARGS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^(\d+)\s+(.+)$").expect("reply argument pattern is valid")
});

/// Slash commands understood by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Help,
    Order,
    Who,
    Answer(&'a str),
    End,
    Reply(&'a str),
}

impl<'a> Command<'a> {
    /// Parse `/name args` or `/name@botname args`. Unknown commands are `None`
    /// and get routed like ordinary text.
    pub fn parse(text: &'a str) -> Option<Self> {
        let text = text.trim_start();
        let rest = text.strip_prefix('/')?;
        let (word, args) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };
        let name = word.split('@').next().unwrap_or(word);

        match name.to_ascii_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "order" => Some(Command::Order),
            "who" => Some(Command::Who),
            "answer" => Some(Command::Answer(args)),
            "end" => Some(Command::End),
            "r" => Some(Command::Reply(args)),
            _ => None,
        }
    }

    pub fn is_admin_only(&self) -> bool {
        !matches!(self, Command::Start | Command::Help | Command::Order)
    }
}

/// A positive numeric user id, as typed by the admin.
pub fn parse_user_id(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Split `/r` arguments into the recipient and the text to send.
pub fn parse_reply_args(args: &str) -> Option<(i64, &str)> {
    let caps = REPLY_ARGS.captures(args.trim())?;
    let user_id = parse_user_id(caps.get(1)?.as_str())?;
    let text = caps.get(2)?.as_str().trim();
    if text.is_empty() {
        return None;
    }
    Some((user_id, text))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuickReply {
    Thanks,
    OnIt,
    Generic,
}

impl QuickReply {
    fn as_str(&self) -> &'static str {
        match self {
            QuickReply::Thanks => "thanks",
            QuickReply::OnIt => "onit",
            QuickReply::Generic => "generic",
        }
    }
}

/// Data carried by the inline buttons of an admin notification card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAction {
    SetTarget(i64),
    Quick(QuickReply, i64),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        let mut parts = data.split(':');
        match parts.next()? {
            "ans" => {
                let user_id = parse_user_id(parts.next()?)?;
                parts.next().is_none().then_some(CallbackAction::SetTarget(user_id))
            }
            "qr" => {
                let kind = match parts.next()? {
                    "thanks" => QuickReply::Thanks,
                    "onit" => QuickReply::OnIt,
                    _ => QuickReply::Generic,
                };
                let user_id = parse_user_id(parts.next()?)?;
                parts.next().is_none().then_some(CallbackAction::Quick(kind, user_id))
            }
            _ => None,
        }
    }

    pub fn encode(&self) -> String {
        match self {
            CallbackAction::SetTarget(user_id) => format!("ans:{user_id}"),
            CallbackAction::Quick(kind, user_id) => format!("qr:{}:{user_id}", kind.as_str()),
        }
    }
}

impl Relay {
    pub(crate) async fn handle_command(
        &self,
        command: Command<'_>,
        msg: &IncomingMessage,
    ) -> Result<()> {
        if command.is_admin_only() && !self.is_admin(msg.sender.id) {
            debug!(
                "Ignoring admin command {:?} from non-admin {}",
                command, msg.sender.id
            );
            return Ok(());
        }

        let chat = msg.chat_id;
        match command {
            Command::Start | Command::Help => {
                self.messenger
                    .send_html(chat, &self.config.welcome_text, None)
                    .await
            }
            Command::Order => {
                self.messenger
                    .send_html(chat, &format::order_links(&self.config.links), None)
                    .await
            }
            Command::Who => {
                let text = match self.session.target().await {
                    Some(target) => format::current_target(target),
                    None => format::NO_TARGET_HINT.to_string(),
                };
                self.messenger.send_html(chat, &text, None).await
            }
            Command::Answer(args) => match parse_user_id(args) {
                Some(user_id) => {
                    self.session.set_target(user_id).await;
                    match self.visitors.get(user_id).await {
                        Some(visitor) => {
                            info!("Admin target set to {} ({})", user_id, visitor.display_name)
                        }
                        None => warn!("Admin target set to {}, who has not written in", user_id),
                    }
                    self.messenger
                        .send_html(chat, &format::target_set(user_id), None)
                        .await
                }
                None => self.messenger.send_plain(chat, format::ANSWER_USAGE).await,
            },
            Command::End => self.end_session(chat, msg).await,
            Command::Reply(args) => match parse_reply_args(args) {
                Some((user_id, text)) => {
                    match self.deliver_text(user_id, text, msg.received_at).await {
                        Ok(()) => {
                            self.messenger
                                .send_html(chat, &format::delivered(user_id), None)
                                .await
                        }
                        Err(e) => self.messenger.send_html(chat, &format::failed(&e), None).await,
                    }
                }
                None => self.messenger.send_plain(chat, format::REPLY_USAGE).await,
            },
        }
    }

    /// Send the closing text to the target. The session ends whether or not
    /// delivery succeeds.
    async fn end_session(&self, chat: i64, msg: &IncomingMessage) -> Result<()> {
        let Some(target) = self.session.target().await else {
            return self
                .messenger
                .send_plain(chat, format::END_WITHOUT_TARGET)
                .await;
        };

        let closing = self.config.closing_text.clone();
        let outcome = self.deliver_text(target, &closing, msg.received_at).await;
        self.session.clear_target().await;
        info!("Admin session with {} ended", target);

        match outcome {
            Ok(()) => {
                self.messenger
                    .send_html(chat, &format::session_ended(target), None)
                    .await
            }
            Err(e) => {
                self.messenger
                    .send_html(chat, &format::end_failed(&e), None)
                    .await
            }
        }
    }

    /// Handle an inline button press and produce the feedback to show.
    pub async fn handle_callback(&self, callback: &IncomingCallback) -> CallbackFeedback {
        if !self.is_admin(callback.sender.id) {
            debug!("Ignoring callback from non-admin {}", callback.sender.id);
            return CallbackFeedback::silent();
        }

        let Some(action) = CallbackAction::parse(&callback.data) else {
            warn!("Unrecognised callback data: {:?}", callback.data);
            return CallbackFeedback::silent();
        };

        match action {
            CallbackAction::SetTarget(user_id) => {
                self.session.set_target(user_id).await;
                info!("Admin target set to {} from notification card", user_id);
                let confirmation = format!(
                    "✅ Target set to <code>{user_id}</code>.\n\
                     Send your message now. Use /end to finish the session."
                );
                if let Err(e) = self
                    .messenger
                    .send_html(self.admin_id, &confirmation, None)
                    .await
                {
                    error!("Failed to confirm target to admin: {:#}", e);
                }
                CallbackFeedback::toast("Target set")
            }
            CallbackAction::Quick(kind, user_id) => {
                let text = match kind {
                    QuickReply::Thanks => self.config.thanks_text.clone(),
                    QuickReply::OnIt => self.config.on_it_text.clone(),
                    QuickReply::Generic => "Thanks for your message!".to_string(),
                };
                match self.deliver_text(user_id, &text, callback.received_at).await {
                    Ok(()) => CallbackFeedback::toast("Sent ✅"),
                    Err(e) => CallbackFeedback::alert(format!("Failed: {}", e)),
                }
            }
        }
    }

    /// Send admin-authored text to `user_id` and audit it.
    async fn deliver_text(
        &self,
        user_id: i64,
        text: &str,
        at: chrono::DateTime<chrono::Utc>,
    ) -> Result<()> {
        if let Err(e) = self.messenger.send_plain(user_id, text).await {
            error!("Failed to deliver message to {}: {:#}", user_id, e);
            return Err(e);
        }
        self.audit(at, Direction::Out, user_id, "admin", "text", text)
            .await;
        info!("Admin message delivered to {}", user_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/help"), Some(Command::Help));
        assert_eq!(Command::parse("/order"), Some(Command::Order));
        assert_eq!(Command::parse("/who"), Some(Command::Who));
        assert_eq!(Command::parse("/end"), Some(Command::End));
        assert_eq!(
            Command::parse("/answer 123456789"),
            Some(Command::Answer("123456789"))
        );
        assert_eq!(
            Command::parse("/r 42 hello world"),
            Some(Command::Reply("42 hello world"))
        );
    }

    #[test]
    fn test_parse_strips_bot_mention() {
        assert_eq!(
            Command::parse("/answer@support_bot 77"),
            Some(Command::Answer("77"))
        );
        assert_eq!(Command::parse("/WHO@support_bot"), Some(Command::Who));
    }

    #[test]
    fn test_unknown_or_plain_text_is_not_a_command() {
        assert_eq!(Command::parse("/pricing"), None);
        assert_eq!(Command::parse("hello /start"), None);
        assert_eq!(Command::parse("plain text"), None);
    }

    #[test]
    fn test_only_public_commands_skip_admin_guard() {
        assert!(!Command::Start.is_admin_only());
        assert!(!Command::Order.is_admin_only());
        assert!(Command::Who.is_admin_only());
        assert!(Command::Reply("").is_admin_only());
    }

    #[test]
    fn test_parse_user_id() {
        assert_eq!(parse_user_id("123456789"), Some(123456789));
        assert_eq!(parse_user_id(" 42 "), Some(42));
        assert_eq!(parse_user_id("abc"), None);
        assert_eq!(parse_user_id("-5"), None);
        assert_eq!(parse_user_id("0"), None);
        assert_eq!(parse_user_id(""), None);
        assert_eq!(parse_user_id("99999999999999999999999"), None);
    }

    #[test]
    fn test_parse_reply_args() {
        assert_eq!(parse_reply_args("42 hello world"), Some((42, "hello world")));
        assert_eq!(
            parse_reply_args("123456 line one\nline two"),
            Some((123456, "line one\nline two"))
        );
        assert_eq!(parse_reply_args("hello"), None);
        assert_eq!(parse_reply_args("42"), None);
        assert_eq!(parse_reply_args("42abc text"), None);
        assert_eq!(parse_reply_args(""), None);
    }

    #[test]
    fn test_callback_data_parsing() {
        assert_eq!(
            CallbackAction::parse("ans:555"),
            Some(CallbackAction::SetTarget(555))
        );
        assert_eq!(
            CallbackAction::parse("qr:thanks:555"),
            Some(CallbackAction::Quick(QuickReply::Thanks, 555))
        );
        assert_eq!(
            CallbackAction::parse("qr:onit:555"),
            Some(CallbackAction::Quick(QuickReply::OnIt, 555))
        );
        assert_eq!(
            CallbackAction::parse("qr:other:555"),
            Some(CallbackAction::Quick(QuickReply::Generic, 555))
        );
        assert_eq!(CallbackAction::parse("ans:abc"), None);
        assert_eq!(CallbackAction::parse("ans:1:2"), None);
        assert_eq!(CallbackAction::parse("noop"), None);
    }

    #[test]
    fn test_callback_encoding_matches_parser() {
        for action in [
            CallbackAction::SetTarget(10),
            CallbackAction::Quick(QuickReply::Thanks, 10),
            CallbackAction::Quick(QuickReply::OnIt, 10),
        ] {
            assert_eq!(CallbackAction::parse(&action.encode()), Some(action));
        }
    }
}
