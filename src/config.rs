use std::net::SocketAddr;

use url::Url;

use crate::bank::BankSource;
use crate::error::ConfigError;
use crate::session::QuizPolicy;

pub const DEFAULT_RECIPIENT: &str = "shikhirev.nn@phystech.edu";

/// Runtime settings, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: Option<String>,
    pub bank_source: BankSource,
    pub policy: QuizPolicy,
    pub log_level: tracing::Level,
    pub relay_addr: SocketAddr,
    pub feedback_url: Url,
    pub mail: MailConfig,
    pub webhook: Option<WebhookConfig>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// HTTP mail gateway. Mails only go to the log when unset.
    pub api_url: Option<Url>,
    pub api_token: Option<String>,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Url,
    pub addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port: u16 = parse_or(var("PORT"), "PORT", 3000)?;
        let relay_addr = match var("RELAY_ADDR") {
            Some(addr) => parse(addr, "RELAY_ADDR")?,
            None => SocketAddr::from(([0, 0, 0, 0], port)),
        };
        let feedback_url = match var("FEEDBACK_URL") {
            Some(url) => parse(url, "FEEDBACK_URL")?,
            None => {
                let local = format!("http://127.0.0.1:{}/api/feedback", relay_addr.port());
                parse(local, "FEEDBACK_URL")?
            }
        };

        let webhook = match (var("NGROK_URL"), var("NGROK_ADDR")) {
            (Some(url), Some(addr)) => Some(WebhookConfig {
                url: parse(url, "NGROK_URL")?,
                addr: parse(addr, "NGROK_ADDR")?,
            }),
            _ => None,
        };

        let mail = MailConfig {
            api_url: var("MAIL_API_URL")
                .map(|url| parse(url, "MAIL_API_URL"))
                .transpose()?,
            api_token: var("MAIL_API_TOKEN"),
            from: var("EMAIL_USER").unwrap_or_else(|| "quiz@localhost".to_string()),
            to: var("RECIPIENT_EMAIL").unwrap_or_else(|| DEFAULT_RECIPIENT.to_string()),
        };

        Ok(Self {
            bot_token: var("TELOXIDE_TOKEN"),
            bank_source: BankSource::parse(
                &var("QUESTION_BANK").unwrap_or_else(|| "./quizData.json".to_string()),
            ),
            policy: QuizPolicy {
                shuffle_options: parse_bool(var("SHUFFLE_OPTIONS"), "SHUFFLE_OPTIONS", true)?,
                allow_back: parse_bool(var("ALLOW_BACK"), "ALLOW_BACK", true)?,
            },
            log_level: parse_or(var("LOG_LEVEL"), "LOG_LEVEL", tracing::Level::INFO)?,
            relay_addr,
            feedback_url,
            mail,
            webhook,
        })
    }
}

fn parse<T: std::str::FromStr>(value: String, key: &'static str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { key, value })
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    value.map_or(Ok(default), |value| parse(value, key))
}

fn parse_bool(value: Option<String>, key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(_) => Err(ConfigError::Invalid {
            key,
            value: value.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert!(config.bot_token.is_none());
        assert_eq!(
            config.bank_source,
            BankSource::File(PathBuf::from("./quizData.json"))
        );
        assert_eq!(config.policy, QuizPolicy::default());
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.relay_addr.port(), 3000);
        assert_eq!(
            config.feedback_url.as_str(),
            "http://127.0.0.1:3000/api/feedback"
        );
        assert_eq!(config.mail.to, DEFAULT_RECIPIENT);
        assert!(config.mail.api_url.is_none());
        assert!(config.webhook.is_none());
    }

    #[test]
    fn port_drives_relay_and_feedback_url() {
        let config = config(&[("PORT", "8080")]).unwrap();
        assert_eq!(config.relay_addr.port(), 8080);
        assert_eq!(
            config.feedback_url.as_str(),
            "http://127.0.0.1:8080/api/feedback"
        );
    }

    #[test]
    fn reads_policy_and_mail_settings() {
        let config = config(&[
            ("SHUFFLE_OPTIONS", "false"),
            ("ALLOW_BACK", "0"),
            ("MAIL_API_URL", "https://mail.example.org/send"),
            ("EMAIL_USER", "bot@example.org"),
            ("RECIPIENT_EMAIL", "lecturer@example.org"),
            ("QUESTION_BANK", "https://example.org/quizData.json"),
            ("LOG_LEVEL", "debug"),
        ])
        .unwrap();
        assert!(!config.policy.shuffle_options);
        assert!(!config.policy.allow_back);
        assert_eq!(config.mail.from, "bot@example.org");
        assert_eq!(config.mail.to, "lecturer@example.org");
        assert!(config.mail.api_url.is_some());
        assert!(matches!(config.bank_source, BankSource::Remote(_)));
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn webhook_needs_both_values() {
        assert!(config(&[("NGROK_URL", "https://abc.ngrok.io")])
            .unwrap()
            .webhook
            .is_none());
        let config = config(&[
            ("NGROK_URL", "https://abc.ngrok.io"),
            ("NGROK_ADDR", "127.0.0.1:8443"),
        ])
        .unwrap();
        assert_eq!(config.webhook.unwrap().addr.port(), 8443);
    }

    #[test]
    fn invalid_values_are_reported() {
        let error = config(&[("PORT", "eighty")]).unwrap_err();
        assert_eq!(error.to_string(), "PORT has an invalid value 'eighty'");
        assert!(config(&[("SHUFFLE_OPTIONS", "maybe")]).is_err());
        assert!(config(&[("MAIL_API_URL", "not a url")]).is_err());
    }
}
