use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub relay: RelayConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub admin_id: i64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub public_base_url: String,
    pub bind_address: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_audit_log_path")]
    pub audit_log_path: PathBuf,
    /// Minimum gap between two forwarded messages from the same user.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
    #[serde(default = "default_welcome_text")]
    pub welcome_text: String,
    #[serde(default = "default_closing_text")]
    pub closing_text: String,
    #[serde(default = "default_thanks_text")]
    pub thanks_text: String,
    #[serde(default = "default_on_it_text")]
    pub on_it_text: String,
    /// Entries listed by `/order`. Nothing is shipped by default; configure
    /// them as `[[relay.links]]` tables.
    #[serde(default)]
    pub links: Vec<LinkConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            audit_log_path: default_audit_log_path(),
            cooldown_ms: default_cooldown_ms(),
            welcome_text: default_welcome_text(),
            closing_text: default_closing_text(),
            thanks_text: default_thanks_text(),
            on_it_text: default_on_it_text(),
            links: Vec::new(),
        }
    }
}

// ── Raw file layout (every field optional, env fills the gaps) ─────────────────

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    telegram: FileTelegram,
    #[serde(default)]
    server: FileServer,
    #[serde(default)]
    relay: RelayConfig,
}

#[derive(Debug, Deserialize, Default)]
struct FileTelegram {
    bot_token: Option<String>,
    admin_id: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct FileServer {
    public_base_url: Option<String>,
    bind_address: Option<String>,
    port: Option<u16>,
}

fn default_audit_log_path() -> PathBuf {
    PathBuf::from("dialog_log.csv")
}

fn default_cooldown_ms() -> u64 {
    1000
}

fn default_port() -> u16 {
    8080
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_welcome_text() -> String {
    "👋 <b>Welcome to support!</b>\n\n\
     Send your question or request here and I'll reply as soon as possible.\n\n\
     Use /order to view our main links."
        .to_string()
}

fn default_closing_text() -> String {
    "Thank you for reaching out! If you have more questions, just message me here anytime."
        .to_string()
}

fn default_thanks_text() -> String {
    "Thanks! I've received your message and will get back to you shortly.".to_string()
}

fn default_on_it_text() -> String {
    "Got it, I'm on it now. I'll update you soon.".to_string()
}

impl Config {
    /// Load `path` if it exists, then overlay `BOT_TOKEN`, `ADMIN_ID`,
    /// `PUBLIC_BASE_URL` and `PORT` from the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    fn from_sources(content: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let file: FileConfig = match content {
            Some(text) => toml::from_str(text).context("Failed to parse config file")?,
            None => FileConfig::default(),
        };

        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let bot_token = match lookup("BOT_TOKEN").or(file.telegram.bot_token) {
            Some(token) => token.trim().to_string(),
            None => bail!("BOT_TOKEN is required (environment or [telegram].bot_token)"),
        };

        let admin_id = match lookup("ADMIN_ID") {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .with_context(|| format!("ADMIN_ID must be a number, got '{}'", raw))?,
            None => match file.telegram.admin_id {
                Some(id) => id,
                None => bail!("ADMIN_ID is required (environment or [telegram].admin_id)"),
            },
        };
        if admin_id <= 0 {
            bail!("ADMIN_ID must be a positive user id, got {}", admin_id);
        }

        let public_base_url = match lookup("PUBLIC_BASE_URL").or(file.server.public_base_url) {
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => bail!("PUBLIC_BASE_URL is required (environment or [server].public_base_url)"),
        };

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", raw))?,
            None => file.server.port.unwrap_or_else(default_port),
        };

        Ok(Config {
            telegram: TelegramConfig {
                bot_token,
                admin_id,
            },
            server: ServerConfig {
                public_base_url,
                bind_address: file
                    .server
                    .bind_address
                    .unwrap_or_else(default_bind_address),
                port,
            },
            relay: file.relay,
        })
    }

    /// Path segment Telegram posts updates to; the token doubles as the secret.
    pub fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.telegram.bot_token)
    }

    pub fn webhook_url(&self) -> String {
        format!("{}{}", self.server.public_base_url, self.webhook_path())
    }
}
