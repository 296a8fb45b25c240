use teloxide::utils::html;

use crate::config::LinkConfig;
use crate::platform::IncomingMessage;

pub const RECEIVED_ACK: &str = "✅ Your message has been received! I'll get back to you soon.";
pub const FORWARD_FAILED: &str = "⚠️ An error occurred. Please try again later.";
pub const SENT_TO_TARGET: &str = "✅ Sent to current target.";

pub const ANSWER_USAGE: &str = "Usage: /answer <user_id>\n\
     Tip: the user_id is shown in the admin notification card.";
pub const REPLY_USAGE: &str = "Usage: /r <user_id> <text>";
pub const NO_TARGET_HINT: &str = "No active target. Use /answer <user_id> or tap \
     \"Answer (set target)\" under a notification card.";
pub const END_WITHOUT_TARGET: &str = "No active target to end. Use /answer <user_id> first.";

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

/// First line pair of every admin notification: who wrote, and whether they
/// are new today.
pub fn admin_header(msg: &IncomingMessage, is_new_today: bool) -> String {
    let badge = if is_new_today { " 🔴 <b>NEW</b>" } else { "" };
    let username = msg
        .sender
        .username
        .as_deref()
        .map(|u| format!(" @{}", html::escape(u)))
        .unwrap_or_default();
    format!(
        "🚨 <b>New client message</b>{badge}\n👤 <b>{}</b>{username} (<code>{}</code>)",
        html::escape(&msg.sender.full_name),
        msg.sender.id,
    )
}

/// Notification sent to the admin for an accepted user message.
pub fn admin_summary(msg: &IncomingMessage, is_new_today: bool) -> String {
    let header = admin_header(msg, is_new_today);
    if msg.is_text() {
        let text = msg.text.as_deref().unwrap_or_default();
        format!("{header}\n\n{}", html::escape(text))
    } else {
        format!("{header} sent <b>{}</b>", msg.kind.as_str())
    }
}

/// Header used when the escaped text does not fit next to it; the raw text
/// follows as plain messages.
pub fn admin_header_for_long_text(msg: &IncomingMessage, is_new_today: bool) -> String {
    format!(
        "{}\n\n<i>Long message, text follows.</i>",
        admin_header(msg, is_new_today)
    )
}

/// Split `text` into chunks of at most `max_chars` characters, preferring to
/// break after a newline, then after a space.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let end = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = rest[..end]
            .rfind('\n')
            .or_else(|| rest[..end].rfind(' '))
            .map(|pos| pos + 1)
            .unwrap_or(end);
        chunks.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

pub fn order_links(links: &[LinkConfig]) -> String {
    let mut text = String::from("🧠 <b>Order Links</b>\n\n");
    if links.is_empty() {
        text.push_str("No links configured yet.");
        return text;
    }
    let lines: Vec<String> = links
        .iter()
        .map(|link| format!("{}: {}", html::escape(&link.label), html::escape(&link.url)))
        .collect();
    text.push_str(&lines.join("\n"));
    text
}

pub fn current_target(user_id: i64) -> String {
    format!(
        "🎯 Current target: <code>{user_id}</code>\n\
         Send any message/media to deliver it.\n\
         Use /end to finish the session."
    )
}

pub fn target_set(user_id: i64) -> String {
    format!(
        "✅ Target set to <code>{user_id}</code>.\n\
         Send any message (text/photo/video/file/voice) and it will be delivered to this user.\n\
         Use /end to finish the session and send a closing message."
    )
}

pub fn session_ended(user_id: i64) -> String {
    format!("🧹 Session ended and closing message sent to <code>{user_id}</code>.")
}

pub fn delivered(user_id: i64) -> String {
    format!("✅ Delivered to <code>{user_id}</code>.")
}

pub fn failed(error: &anyhow::Error) -> String {
    format!("❌ Failed: {}", html::escape(&error.to_string()))
}

pub fn end_failed(error: &anyhow::Error) -> String {
    format!(
        "❌ Failed to send closing message: {}",
        html::escape(&error.to_string())
    )
}
