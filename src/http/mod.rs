use crate::config::Config;
use crate::error::NetworkError;
use crate::types::Environment;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_REPLY: &str = concat!(
    "Thank you for your question. I've received it and will provide ",
    "assistance based on compliance best practices."
);

/// Body POSTed to the webhook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookPayload {
    pub message: String,
    pub timestamp: String,
    pub environment: Environment,
}

impl WebhookPayload {
    pub fn new(message: &str, at: DateTime<Utc>, environment: Environment) -> Self {
        Self {
            message: message.to_string(),
            // Matches `Date.prototype.toISOString()`: millisecond precision, `Z` suffix.
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            environment,
        }
    }
}

pub fn build_client(cfg: &Config) -> reqwest::Result<Client> {
    let mut default_headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(&cfg.user_agent) {
        default_headers.insert(USER_AGENT, ua);
    } else {
        warn!("Ignoring invalid user agent {:?}", cfg.user_agent);
    }
    let mut builder = Client::builder()
        .default_headers(default_headers)
        .use_rustls_tls();
    // No timeout unless configured; the transport decides when a hung call fails.
    if let Some(secs) = cfg.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

/// Pulls the reply text out of a webhook response body.
///
/// Prefers `response`, then `message`; empty or non-string values count as
/// absent. Anything else, including a body that is not JSON, yields
/// [`DEFAULT_REPLY`].
pub fn extract_reply(body: &str) -> String {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => {
            debug!("Webhook body is not JSON ({}); using default reply", e);
            return DEFAULT_REPLY.to_string();
        }
    };
    ["response", "message"]
        .iter()
        .filter_map(|field| value.get(field).and_then(Value::as_str))
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| DEFAULT_REPLY.to_string())
}

/// POSTs one message and returns the reply text.
pub async fn post_message(
    client: &Client,
    url: &str,
    payload: &WebhookPayload,
) -> Result<String, NetworkError> {
    debug!("POST {} environment={}", url, payload.environment);
    let res = client
        .post(url)
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .json(payload)
        .send()
        .await
        .map_err(|e| {
            warn!("Webhook POST error sending request: {}", e);
            NetworkError::Transport(e)
        })?;

    let status = res.status();
    if !status.is_success() {
        warn!("Webhook POST {} failed with status {}", url, status);
        return Err(NetworkError::Status(status));
    }
    // A body cut off mid-read is a transport failure, not a malformed reply.
    let text = res.text().await.map_err(|e| {
        warn!("Webhook POST {} failed reading response body: {}", url, e);
        NetworkError::Transport(e)
    })?;
    Ok(extract_reply(&text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reply_field_precedence() {
        assert_eq!(extract_reply(r#"{"response":"A","message":"B"}"#), "A");
        assert_eq!(extract_reply(r#"{"message":"Use a DPIA."}"#), "Use a DPIA.");
        assert_eq!(extract_reply(r#"{"response":"","message":"B"}"#), "B");
        assert_eq!(extract_reply(r#"{"response":42,"message":"B"}"#), "B");
    }

    #[test]
    fn reply_falls_back_to_default() {
        assert_eq!(extract_reply("{}"), DEFAULT_REPLY);
        assert_eq!(extract_reply("<html>oops</html>"), DEFAULT_REPLY);
        assert_eq!(extract_reply(""), DEFAULT_REPLY);
        assert_eq!(extract_reply(r#"["response"]"#), DEFAULT_REPLY);
    }

    #[test]
    fn payload_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 30, 0).unwrap();
        let p = WebhookPayload::new("What is GDPR?", at, Environment::Production);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "message": "What is GDPR?",
                "timestamp": "2024-01-01T09:30:00.000Z",
                "environment": "production"
            })
        );
    }
}
