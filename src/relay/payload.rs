//! Feedback payload accepted by `POST /api/feedback` and the mail built from it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use teloxide::utils::html::escape;

use crate::bank::question::TaskId;
use crate::config::MailConfig;
use crate::error::RelayError;

use super::mailer::OutgoingMail;

/// Browsers send `Date.now()` millis or an ISO string; both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ClientTimestamp {
    Millis(i64),
    Text(String),
}

impl ClientTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            ClientTimestamp::Millis(millis) => Utc.timestamp_millis_opt(*millis).single(),
            ClientTimestamp::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|time| time.with_timezone(&Utc)),
        }
    }
}

impl From<DateTime<Utc>> for ClientTimestamp {
    fn from(time: DateTime<Utc>) -> Self {
        ClientTimestamp::Text(time.to_rfc3339())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<ClientTimestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub task_id: TaskId,
    pub question_text: String,
    pub user_answer: String,
    pub correct_answer: String,
    pub description: String,
    pub sent_at: DateTime<Utc>,
    pub user_agent: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl FeedbackRequest {
    pub fn validate(self) -> Result<Feedback, RelayError> {
        let task_id = self
            .task_id
            .filter(|id| !id.as_str().trim().is_empty())
            .ok_or(RelayError::MissingFields)?;
        let question_text = required(self.question_text).ok_or(RelayError::MissingFields)?;
        let description = required(self.description).ok_or(RelayError::MissingFields)?;

        Ok(Feedback {
            task_id,
            question_text,
            user_answer: self.user_answer.unwrap_or_default(),
            correct_answer: self.correct_answer.unwrap_or_default(),
            description,
            sent_at: self
                .timestamp
                .as_ref()
                .and_then(ClientTimestamp::to_datetime)
                .unwrap_or_else(Utc::now),
            user_agent: self.user_agent,
        })
    }
}

impl Feedback {
    pub fn subject(&self) -> String {
        format!("[Mathstat Quiz] Task {} Feedback", self.task_id)
    }

    pub fn html(&self) -> String {
        let mut html = String::new();
        html.push_str("<h2>Feedback from Mathstat Quiz</h2>\n<h3>Question Info:</h3>\n<ul>\n");
        let rows = [
            ("Task", escape(self.task_id.as_str())),
            ("Question", escape(&self.question_text)),
            ("Student Answer", escape(&self.user_answer)),
            ("Correct Answer", escape(&self.correct_answer)),
            ("Time", self.sent_at.format("%d.%m.%Y, %H:%M:%S").to_string()),
        ];
        for (label, value) in rows {
            html.push_str(&format!("<li><strong>{label}:</strong> {value}</li>\n"));
        }
        if let Some(agent) = &self.user_agent {
            html.push_str(&format!(
                "<li><strong>Client:</strong> {}</li>\n",
                escape(agent)
            ));
        }
        html.push_str("</ul>\n<h3>Description:</h3>\n<p>");
        html.push_str(&escape(&self.description).replace('\n', "<br>"));
        html.push_str("</p>\n");
        html
    }

    pub fn to_mail(&self, config: &MailConfig) -> OutgoingMail {
        OutgoingMail {
            from: config.from.clone(),
            to: config.to.clone(),
            subject: self.subject(),
            html: self.html(),
        }
    }
}
