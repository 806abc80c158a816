use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::payload::FeedbackRequest;
use crate::error::RelayError;

#[derive(Debug, Deserialize)]
struct RelayResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
}

/// Posts feedback to the relay on behalf of a quiz frontend.
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl FeedbackClient {
    pub fn new(endpoint: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    /// Returns the relay's message on success.
    pub async fn submit(&self, request: &FeedbackRequest) -> Result<String, RelayError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        let status = response.status();
        let body: RelayResponse = response.json().await?;

        let message = body.message.unwrap_or_default();
        if body.success && status.is_success() {
            Ok(message)
        } else {
            Err(RelayError::Rejected {
                status: status.as_u16(),
                message,
            })
        }
    }
}
