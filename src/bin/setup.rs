//! Relaybot setup wizard.
//!
//! Asks for the bot token, admin id and public URL on the terminal and writes
//! a `config.toml` the relay can start from. Values can still be overridden
//! later through `BOT_TOKEN`, `ADMIN_ID`, `PUBLIC_BASE_URL` and `PORT`.

use anyhow::{bail, Context, Result};
use std::io::{self, Write};
use std::path::PathBuf;

struct ConfigParams<'a> {
    bot_token: &'a str,
    admin_id: i64,
    public_base_url: &'a str,
    port: u16,
    audit_log_path: &'a str,
    links: &'a [(String, String)],
}

/// Escape a value for a TOML basic string.
fn toml_str(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Produces a valid config.toml string. Extracted so it can be unit-tested.
fn format_config(p: &ConfigParams<'_>) -> String {
    let bot_token = toml_str(p.bot_token);
    let admin_id = p.admin_id;
    let public_base_url = toml_str(p.public_base_url.trim_end_matches('/'));
    let port = p.port;
    let audit_log_path = toml_str(p.audit_log_path);

    let mut out = format!(
        r#"[telegram]
bot_token = "{bot_token}"
admin_id = {admin_id}

[server]
public_base_url = "{public_base_url}"
port = {port}

[relay]
audit_log_path = "{audit_log_path}"
cooldown_ms = 1000
# closing_text = "Thank you for reaching out!"
"#
    );

    for (label, url) in p.links {
        out.push_str(&format!(
            "\n[[relay.links]]\nlabel = \"{}\"\nurl = \"{}\"\n",
            toml_str(label),
            toml_str(url)
        ));
    }
    out
}

/// Parse "Label=https://..." pairs separated by ';'.
fn parse_links(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| {
            let (label, url) = pair.split_once('=')?;
            let (label, url) = (label.trim(), url.trim());
            (!label.is_empty() && !url.is_empty()).then(|| (label.to_owned(), url.to_owned()))
        })
        .collect()
}

fn main() -> Result<()> {
    let project_root =
        PathBuf::from(std::env::var("RELAYBOT_ROOT").unwrap_or_else(|_| ".".to_string()));

    println!("=== Relaybot Setup ===\n");

    let read_line = |prompt: &str| -> Result<String> {
        print!("{prompt}");
        io::stdout().flush()?;
        let mut buf = String::new();
        io::stdin().read_line(&mut buf)?;
        Ok(buf.trim().to_owned())
    };

    let or_default = |s: String, default: &str| {
        if s.is_empty() {
            default.to_owned()
        } else {
            s
        }
    };

    let bot_token = read_line("Telegram bot token: ")?;
    if bot_token.is_empty() {
        bail!("A bot token is required");
    }
    let admin_raw = read_line("Admin user ID: ")?;
    let admin_id: i64 = admin_raw
        .parse()
        .with_context(|| format!("Admin user ID must be a number, got '{admin_raw}'"))?;
    let public_base_url = read_line("Public base URL (e.g. https://relay.example.com): ")?;
    if public_base_url.is_empty() {
        bail!("A public base URL is required for the webhook");
    }
    let port_raw = or_default(read_line("Port [8080]: ")?, "8080");
    let port: u16 = port_raw
        .parse()
        .with_context(|| format!("Port must be a number, got '{port_raw}'"))?;
    let audit_log_path = or_default(
        read_line("Audit log path [dialog_log.csv]: ")?,
        "dialog_log.csv",
    );
    let links = parse_links(&read_line(
        "Order links, optional (Website=https://...;Payment=https://...): ",
    )?);

    let config = format_config(&ConfigParams {
        bot_token: &bot_token,
        admin_id,
        public_base_url: &public_base_url,
        port,
        audit_log_path: &audit_log_path,
        links: &links,
    });

    let config_path = project_root.join("config.toml");
    std::fs::write(&config_path, &config)
        .with_context(|| format!("Could not write {}", config_path.display()))?;

    println!("\n✓  config.toml saved to {}", config_path.display());
    println!("   Run the relay with:  cargo run");
    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(links: &[(String, String)]) -> String {
        format_config(&ConfigParams {
            bot_token: "123:abc",
            admin_id: 777,
            public_base_url: "https://relay.example.com/",
            port: 8080,
            audit_log_path: "dialog_log.csv",
            links,
        })
    }

    #[test]
    fn test_telegram_section_present() {
        let out = cfg(&[]);
        assert!(out.contains("[telegram]"));
        assert!(out.contains(r#"bot_token = "123:abc""#));
        assert!(out.contains("admin_id = 777"));
    }

    #[test]
    fn test_server_section_trims_trailing_slash() {
        let out = cfg(&[]);
        assert!(out.contains("[server]"));
        assert!(out.contains(r#"public_base_url = "https://relay.example.com""#));
        assert!(out.contains("port = 8080"));
    }

    #[test]
    fn test_relay_section_present() {
        let out = cfg(&[]);
        assert!(out.contains("[relay]"));
        assert!(out.contains(r#"audit_log_path = "dialog_log.csv""#));
        assert!(!out.contains("[[relay.links]]"));
    }

    #[test]
    fn test_links_are_written_as_tables() {
        let links = parse_links("Website=https://example.com; Payment = https://pay.example.com;bad");
        assert_eq!(links.len(), 2);
        let out = cfg(&links);
        assert_eq!(out.matches("[[relay.links]]").count(), 2);
        assert!(out.contains(r#"label = "Payment""#));
        assert!(out.contains(r#"url = "https://pay.example.com""#));
    }

    #[test]
    fn test_output_is_valid_toml() {
        let links = vec![("Say \"hi\"".to_string(), "https://x".to_string())];
        let parsed: toml::Value = toml::from_str(&cfg(&links)).unwrap();
        assert_eq!(parsed["telegram"]["admin_id"].as_integer(), Some(777));
        assert_eq!(
            parsed["relay"]["links"][0]["label"].as_str(),
            Some("Say \"hi\"")
        );
    }
}
