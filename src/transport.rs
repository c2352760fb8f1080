//! Delivery of encoded payloads to chat bots.
//!
//! Every bot is a [`Transport`]: something that accepts one payload and
//! reports success or failure. Bots are chosen from configuration through the
//! closed [`TransportKind`] registry; a `[bots.<name>]` table whose name is not
//! listed there is rejected when the config is validated.
//!
//! | Name | Transport | Credential |
//! |------|-----------|------------|
//! | `feishu` | [`FeishuWebhook`]: POST to a custom-bot webhook | webhook URL |
//! | `telegram` | [`TelegramBot`]: Bot API `sendMessage` as plain text | bot token, plus `chat_id` |
//! | `stdout` | [`StdoutTransport`]: one payload per line, for dry runs | none |
//!
//! Payloads are Feishu `post` messages. The Telegram transport renders each
//! one back to plain text, which is never longer than the payload, so the
//! chunk budget still bounds what it sends.
//!
//! Transports do not retry. A failed send is reported to the dispatcher, which
//! moves on to the next chunk.

use crate::config::BotConfig;
use crate::types::{Group, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("server rejected payload with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown bot '{0}'")]
    UnknownBot(String),
    #[error("no credential for bot '{bot}': set ${env} or `key` in config")]
    MissingCredential { bot: String, env: String },
    #[error("bot '{0}' needs `chat_id` in config")]
    MissingChatId(String),
    #[error("payload is not a post message: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Capability to deliver one payload.
pub trait Transport: Send + Sync {
    /// Registry name, used in logs and reports.
    fn name(&self) -> &str;

    /// Deliver one payload.
    fn send(&self, payload: &[u8]) -> Result<(), TransportError>;
}

// ============================================================================
// Registry
// ============================================================================

/// Every transport that can be named in `[bots.<name>]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Feishu,
    Telegram,
    Stdout,
}

impl TransportKind {
    pub const ALL: [TransportKind; 3] = [
        TransportKind::Feishu,
        TransportKind::Telegram,
        TransportKind::Stdout,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TransportKind::Feishu => "feishu",
            TransportKind::Telegram => "telegram",
            TransportKind::Stdout => "stdout",
        }
    }

    /// Construct the transport, resolving its credential from the process
    /// environment.
    pub fn build(self, bot: &BotConfig) -> Result<Box<dyn Transport>, TransportError> {
        self.build_with_env(bot, |name| std::env::var(name).ok())
    }

    /// Construct the transport with an explicit environment lookup.
    pub fn build_with_env(
        self,
        bot: &BotConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Box<dyn Transport>, TransportError> {
        match self {
            TransportKind::Feishu => {
                let webhook = resolve_credential(self.name(), bot, env)?;
                Ok(Box::new(FeishuWebhook::new(webhook)))
            }
            TransportKind::Telegram => {
                let token = resolve_credential(self.name(), bot, env)?;
                let chat_id = bot
                    .chat_id
                    .clone()
                    .filter(|id| !id.trim().is_empty())
                    .ok_or_else(|| TransportError::MissingChatId(self.name().to_string()))?;
                Ok(Box::new(TelegramBot::new(token, chat_id)))
            }
            TransportKind::Stdout => Ok(Box::new(StdoutTransport)),
        }
    }
}

impl FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransportKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| TransportError::UnknownBot(s.to_string()))
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Credential lookup order: the environment variable named by `secret_env`,
/// then the literal `key`. Empty values count as missing.
fn resolve_credential(
    bot: &str,
    config: &BotConfig,
    env: impl Fn(&str) -> Option<String>,
) -> Result<String, TransportError> {
    config
        .secret_env
        .as_deref()
        .and_then(&env)
        .or_else(|| config.key.clone())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| TransportError::MissingCredential {
            bot: bot.to_string(),
            env: config.secret_env.clone().unwrap_or_default(),
        })
}

// ============================================================================
// Feishu custom-bot webhook
// ============================================================================

pub struct FeishuWebhook {
    agent: ureq::Agent,
    webhook: String,
}

impl FeishuWebhook {
    pub fn new(webhook: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            webhook: webhook.into(),
        }
    }
}

fn agent() -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(SEND_TIMEOUT).build()
}

/// POST a JSON body. Returns the status and body of a 2xx reply; any other
/// status is [`TransportError::Rejected`].
fn post_json(agent: &ureq::Agent, url: &str, body: &[u8]) -> Result<(u16, String), TransportError> {
    let response = agent
        .post(url)
        .set("Content-Type", "application/json")
        .send_bytes(body);

    match response {
        Ok(response) => {
            let status = response.status();
            Ok((status, response.into_string()?))
        }
        Err(ureq::Error::Status(status, response)) => Err(TransportError::Rejected {
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(err) => Err(TransportError::Request(err.to_string())),
    }
}

impl Transport for FeishuWebhook {
    fn name(&self) -> &str {
        TransportKind::Feishu.name()
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let (status, body) = post_json(&self.agent, &self.webhook, payload)?;
        check_feishu_reply(status, &body)
    }
}

/// Feishu answers HTTP 200 for most application errors and reports them in
/// the body's `code` field (`StatusCode` on older endpoints); non-zero means
/// the message was not posted.
fn check_feishu_reply(status: u16, body: &str) -> Result<(), TransportError> {
    let reply: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return Ok(()),
    };
    let code = reply
        .get("code")
        .or_else(|| reply.get("StatusCode"))
        .and_then(serde_json::Value::as_i64)
        .unwrap_or(0);
    if code == 0 {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            status,
            body: body.to_string(),
        })
    }
}

// ============================================================================
// Telegram Bot API
// ============================================================================

pub struct TelegramBot {
    agent: ureq::Agent,
    token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Deserialize)]
struct PostEnvelope {
    content: PostContent,
}

#[derive(Deserialize)]
struct PostContent {
    post: PostLocales,
}

#[derive(Deserialize)]
struct PostLocales {
    zh_cn: PostBody,
}

#[derive(Deserialize)]
struct PostBody {
    title: String,
    content: Vec<Group>,
}

impl TelegramBot {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            agent: agent(),
            token: token.into(),
            chat_id: chat_id.into(),
        }
    }

    /// Keep the token out of error messages; it is part of the URL.
    fn redact(&self, message: String) -> String {
        message.replace(&self.token, "<token>")
    }
}

impl Transport for TelegramBot {
    fn name(&self) -> &str {
        TransportKind::Telegram.name()
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let text = post_to_text(payload)?;
        let body = serde_json::to_vec(&SendMessage {
            chat_id: &self.chat_id,
            text: &text,
            disable_web_page_preview: true,
        })?;
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", self.token);
        let (status, reply) = post_json(&self.agent, &url, &body).map_err(|e| match e {
            TransportError::Request(message) => TransportError::Request(self.redact(message)),
            other => other,
        })?;
        check_telegram_reply(status, &reply)
    }
}

/// Render a Feishu `post` payload as plain text: the title, a blank line,
/// then one line per group. A link becomes `label (href)`.
fn post_to_text(payload: &[u8]) -> Result<String, TransportError> {
    let envelope: PostEnvelope = serde_json::from_slice(payload)?;
    let body = envelope.content.post.zh_cn;
    let mut text = body.title;
    text.push('\n');
    for group in &body.content {
        text.push('\n');
        for node in group {
            match node {
                Node::Text { text: run } => text.push_str(run),
                Node::Link { text: label, href } => {
                    text.push_str(label);
                    text.push_str(" (");
                    text.push_str(href);
                    text.push(')');
                }
            }
        }
    }
    Ok(text)
}

/// The Bot API wraps every reply in `{"ok": bool, ...}`.
fn check_telegram_reply(status: u16, body: &str) -> Result<(), TransportError> {
    let ok = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|reply| reply.get("ok").and_then(serde_json::Value::as_bool))
        .unwrap_or(false);
    if ok {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            status,
            body: body.to_string(),
        })
    }
}

// ============================================================================
// Stdout (dry run)
// ============================================================================

pub struct StdoutTransport;

impl Transport for StdoutTransport {
    fn name(&self) -> &str {
        TransportKind::Stdout.name()
    }

    fn send(&self, payload: &[u8]) -> Result<(), TransportError> {
        let mut out = io::stdout().lock();
        out.write_all(payload)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bot(secret_env: Option<&str>, key: Option<&str>) -> BotConfig {
        BotConfig {
            enabled: true,
            secret_env: secret_env.map(str::to_string),
            key: key.map(str::to_string),
            chat_id: None,
        }
    }

    #[test]
    fn registry_names_round_trip() {
        for kind in TransportKind::ALL {
            assert_eq!(kind.name().parse::<TransportKind>().unwrap(), kind);
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = "qq".parse::<TransportKind>().unwrap_err();
        assert!(matches!(err, TransportError::UnknownBot(name) if name == "qq"));
    }

    #[test]
    fn credential_prefers_environment() {
        let config = bot(Some("FEISHU_HOOK"), Some("https://from-config"));
        let value = resolve_credential("feishu", &config, |name| {
            (name == "FEISHU_HOOK").then(|| "https://from-env".to_string())
        })
        .unwrap();
        assert_eq!(value, "https://from-env");
    }

    #[test]
    fn credential_falls_back_to_key() {
        let config = bot(Some("FEISHU_HOOK"), Some("https://from-config"));
        let value = resolve_credential("feishu", &config, |_| None).unwrap();
        assert_eq!(value, "https://from-config");
    }

    #[test]
    fn blank_credential_is_missing() {
        let config = bot(Some("FEISHU_HOOK"), Some("  "));
        let err = resolve_credential("feishu", &config, |_| None).unwrap_err();
        assert!(matches!(
            err,
            TransportError::MissingCredential { ref bot, ref env } if bot == "feishu" && env == "FEISHU_HOOK"
        ));
    }

    #[test]
    fn feishu_build_requires_credential() {
        let result = TransportKind::Feishu.build_with_env(&bot(None, None), |_| None);
        assert!(result.is_err());
    }

    #[test]
    fn feishu_build_with_webhook() {
        let transport = TransportKind::Feishu
            .build_with_env(&bot(None, Some("https://open.feishu.cn/hook/x")), |_| None)
            .unwrap();
        assert_eq!(transport.name(), "feishu");
    }

    #[test]
    fn stdout_needs_no_credential() {
        let transport = TransportKind::Stdout
            .build_with_env(&bot(None, None), |_| None)
            .unwrap();
        assert_eq!(transport.name(), "stdout");
    }

    #[test]
    fn feishu_reply_success() {
        assert!(check_feishu_reply(200, r#"{"code":0,"msg":"success","data":{}}"#).is_ok());
        assert!(check_feishu_reply(200, r#"{"StatusCode":0,"StatusMessage":"success"}"#).is_ok());
    }

    #[test]
    fn feishu_reply_error_code() {
        let err = check_feishu_reply(200, r#"{"code":19001,"msg":"param invalid"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 200, .. }));
    }

    #[test]
    fn feishu_reply_non_json_is_accepted() {
        assert!(check_feishu_reply(200, "ok").is_ok());
    }

    // =========================================================================
    // Telegram
    // =========================================================================

    #[test]
    fn telegram_build_requires_chat_id() {
        let config = bot(Some("TELEGRAM_TOKEN"), None);
        let err = TransportKind::Telegram
            .build_with_env(&config, |_| Some("123:abc".to_string()))
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::MissingChatId(ref bot) if bot == "telegram"));
    }

    #[test]
    fn telegram_build_requires_token() {
        let config = BotConfig {
            chat_id: Some("42".to_string()),
            ..bot(Some("TELEGRAM_TOKEN"), None)
        };
        let result = TransportKind::Telegram.build_with_env(&config, |_| None);
        assert!(matches!(result, Err(TransportError::MissingCredential { .. })));
    }

    #[test]
    fn telegram_build_with_token_and_chat() {
        let config = BotConfig {
            chat_id: Some("-1001234567890".to_string()),
            ..bot(Some("TELEGRAM_TOKEN"), None)
        };
        let transport = TransportKind::Telegram
            .build_with_env(&config, |name| {
                (name == "TELEGRAM_TOKEN").then(|| "123:abc".to_string())
            })
            .unwrap();
        assert_eq!(transport.name(), "telegram");
    }

    #[test]
    fn post_payload_renders_as_plain_text() {
        use crate::payload::{FeishuPost, PayloadEncoder};

        let payload = FeishuPost.encode(
            "每日安全资讯",
            &[
                vec![Node::text("Sec Blog")],
                vec![
                    Node::text("see "),
                    Node::link("漏洞通告", "https://example.com/a?b=1"),
                ],
            ],
        );
        let text = post_to_text(&payload).unwrap();
        assert_eq!(
            text,
            "每日安全资讯\n\nSec Blog\nsee 漏洞通告 (https://example.com/a?b=1)"
        );
        assert!(text.len() <= payload.len());
    }

    #[test]
    fn non_post_payload_is_an_error() {
        assert!(matches!(
            post_to_text(b"not json"),
            Err(TransportError::Payload(_))
        ));
    }

    #[test]
    fn telegram_reply_ok() {
        assert!(check_telegram_reply(200, r#"{"ok":true,"result":{"message_id":7}}"#).is_ok());
    }

    #[test]
    fn telegram_reply_not_ok() {
        let err = check_telegram_reply(200, r#"{"ok":false,"description":"chat not found"}"#)
            .unwrap_err();
        assert!(matches!(err, TransportError::Rejected { status: 200, .. }));
        assert!(check_telegram_reply(200, "gateway").is_err());
    }

    #[test]
    fn telegram_errors_hide_the_token() {
        let transport = TelegramBot::new("123:secret", "42");
        let message = transport.redact("https://api.telegram.org/bot123:secret/sendMessage: timeout".to_string());
        assert!(!message.contains("123:secret"));
        assert!(message.contains("<token>"));
    }
}
