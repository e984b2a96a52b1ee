use crate::error::{Result, ScoutError};
use crate::pipeline::Notifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const SLACK_API_URL: &str = "https://slack.com/api";

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread_ts: Option<&'a str>,
}

/// Every Web API response carries `ok` and, on failure, `error`
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
}

/// Minimal Slack Web API client
#[derive(Clone)]
pub struct SlackClient {
    bot_token: String,
    base_url: String,
    client: reqwest::Client,
}

impl SlackClient {
    pub fn new(bot_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(bot_token, SLACK_API_URL)
    }

    pub fn with_base_url(bot_token: impl Into<String>, base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ScoutError::Slack(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            bot_token: bot_token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn call(&self, method: &str, body: &impl Serialize) -> Result<ApiResponse> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, method))
            .bearer_auth(&self.bot_token)
            .json(body)
            .send()
            .await
            .map_err(|e| ScoutError::Slack(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::Slack(format!("{} returned HTTP {}", method, status)));
        }

        let parsed: ApiResponse = response
            .json()
            .await
            .map_err(|e| ScoutError::Slack(format!("Failed to parse {} response: {}", method, e)))?;

        if !parsed.ok {
            return Err(ScoutError::Slack(format!(
                "{} failed: {}",
                method,
                parsed.error.as_deref().unwrap_or("unknown_error")
            )));
        }
        Ok(parsed)
    }

    /// Post `text` to `channel`, inside the thread when `thread_ts` is set
    pub async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<()> {
        debug!(channel, threaded = thread_ts.is_some(), "Posting Slack message");
        self.call(
            "chat.postMessage",
            &PostMessageRequest {
                channel,
                text,
                thread_ts,
            },
        )
        .await
        .map(|_| ())
    }

    /// User id of the bot behind the token
    pub async fn bot_user_id(&self) -> Result<String> {
        self.call("auth.test", &serde_json::json!({}))
            .await?
            .user_id
            .ok_or_else(|| ScoutError::Slack("auth.test returned no user_id".to_string()))
    }
}

/// Streams pipeline diagnostics into the thread a question came from
pub struct SlackNotifier {
    client: SlackClient,
    channel: String,
    thread_ts: Option<String>,
}

impl SlackNotifier {
    pub fn new(client: SlackClient, channel: impl Into<String>, thread_ts: Option<String>) -> Self {
        Self {
            client,
            channel: channel.into(),
            thread_ts,
        }
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify(&self, text: &str) {
        if let Err(e) = self
            .client
            .post_message(&self.channel, text, self.thread_ts.as_deref())
            .await
        {
            warn!(error = %e, "Failed to post diagnostic message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_message_body_omits_missing_thread() {
        let body = serde_json::to_value(PostMessageRequest {
            channel: "C1",
            text: "hi",
            thread_ts: None,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"channel": "C1", "text": "hi"}));

        let threaded = serde_json::to_value(PostMessageRequest {
            channel: "C1",
            text: "hi",
            thread_ts: Some("123.456"),
        })
        .unwrap();
        assert_eq!(threaded["thread_ts"], "123.456");
    }

    #[test]
    fn test_api_error_response_parses() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"ok":false,"error":"channel_not_found"}"#).unwrap();
        assert!(!parsed.ok);
        assert_eq!(parsed.error.as_deref(), Some("channel_not_found"));
    }
}
