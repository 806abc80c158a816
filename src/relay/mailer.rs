//! Outbound mail delivery for the feedback relay.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use url::Url;

use crate::config::MailConfig;
use crate::error::RelayError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), RelayError>;

    /// Startup check that the transport is reachable.
    async fn verify(&self) -> Result<(), RelayError> {
        Ok(())
    }

    fn describe(&self) -> String;
}

/// Posts mails as JSON to an HTTP mail gateway.
#[derive(Debug, Clone)]
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpMailer {
    pub fn new(endpoint: Url, token: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            token,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), RelayError> {
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(mail)
            .timeout(self.timeout);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(endpoint = %self.endpoint, %status, "mail gateway rejected message");
            return Err(RelayError::Mail(format!(
                "gateway returned status {status}: {body}"
            )));
        }
        tracing::debug!(endpoint = %self.endpoint, subject = %mail.subject, "mail sent");
        Ok(())
    }

    /// Any HTTP answer counts as reachable; only transport errors fail.
    async fn verify(&self) -> Result<(), RelayError> {
        self.client
            .head(self.endpoint.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("http gateway {}", self.endpoint)
    }
}

/// Writes mails to the log. Used when no gateway is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), RelayError> {
        tracing::info!(
            from = %mail.from,
            to = %mail.to,
            subject = %mail.subject,
            html = %mail.html,
            "feedback mail (no gateway configured)"
        );
        Ok(())
    }

    fn describe(&self) -> String {
        "log only".to_string()
    }
}

pub fn mailer_from_config(config: &MailConfig) -> Box<dyn Mailer> {
    match &config.api_url {
        Some(url) => Box::new(HttpMailer::new(url.clone(), config.api_token.clone())),
        None => Box::new(LogMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mail() -> OutgoingMail {
        OutgoingMail {
            from: "bot@example.org".into(),
            to: "lecturer@example.org".into(),
            subject: "[Mathstat Quiz] Task 1 Feedback".into(),
            html: "<p>hi</p>".into(),
        }
    }

    fn endpoint(server: &MockServer) -> Url {
        format!("{}/send", server.uri()).parse().unwrap()
    }

    #[tokio::test]
    async fn posts_mail_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/send"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::json!({
                "from": "bot@example.org",
                "to": "lecturer@example.org",
                "subject": "[Mathstat Quiz] Task 1 Feedback",
                "html": "<p>hi</p>"
            })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(endpoint(&server), Some("secret".into()));
        mailer.send(&mail()).await.unwrap();
    }

    #[tokio::test]
    async fn gateway_errors_become_mail_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(endpoint(&server), None);
        let error = mailer.send(&mail()).await.unwrap_err();
        assert!(matches!(error, RelayError::Mail(ref msg) if msg.contains("503")));
        assert_eq!(error.status_code(), 500);
    }

    #[tokio::test]
    async fn verify_accepts_any_http_answer() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;

        let mailer = HttpMailer::new(endpoint(&server), None);
        assert!(mailer.verify().await.is_ok());
    }

    #[tokio::test]
    async fn unreachable_gateway_fails_verification() {
        let mailer = HttpMailer::new("http://127.0.0.1:9/send".parse().unwrap(), None)
            .with_timeout(Duration::from_millis(500));
        assert!(matches!(
            mailer.verify().await,
            Err(RelayError::Network(_))
        ));
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        assert!(LogMailer.send(&mail()).await.is_ok());
        assert_eq!(LogMailer.describe(), "log only");
    }

    #[test]
    fn config_selects_mailer() {
        let mut config = MailConfig {
            api_url: None,
            api_token: None,
            from: "a@b".into(),
            to: "c@d".into(),
        };
        assert_eq!(mailer_from_config(&config).describe(), "log only");
        config.api_url = Some("https://mail.example.org/send".parse().unwrap());
        assert_eq!(
            mailer_from_config(&config).describe(),
            "http gateway https://mail.example.org/send"
        );
    }
}
