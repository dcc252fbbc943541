//! Remote classification client
//!
//! Builds one prompt per row, posts it to the chat-completion endpoint, and
//! folds transport and payload problems into the row's outcome. Transient
//! failures (network, timeout, 5xx) are retried with exponential backoff; a
//! response without the expected `choices` shape is never retried, since
//! retrying cannot fix a structural mismatch.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::config::{JobConfig, RetryPolicy};
use crate::error::{Error, Result};
use crate::types::{Outcome, Row};

/// Template placeholder → input column
const PLACEHOLDERS: [(&str, &str); 7] = [
    ("{name}", "name"),
    ("{scan_item}", "scan-item"),
    ("{rules}", "rules"),
    ("{cloud_platform}", "cloud-platform"),
    ("{scan_type}", "scan-type"),
    ("{content_description}", "content-description"),
    ("{description}", "description"),
];

/// Seam between the batch scheduler and the remote service.
///
/// The scheduler fans out over this trait, so tests can drive it with an
/// in-process stand-in instead of a network.
#[async_trait]
pub trait Classify: Send + Sync {
    /// Resolve one row to its outcome. Never returns an error: every failure
    /// mode is data (`Outcome::Failed`), not a job-level fault.
    async fn classify(&self, row: &Row) -> Outcome;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request body for the chat-completion endpoint: a fresh per-request session
/// id, single-turn, non-streaming.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest<'a> {
    chat_id: String,
    stream: bool,
    detail: bool,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// How one attempt against the remote service failed
enum CallError {
    /// Network/timeout/5xx; worth retrying with backoff
    Transient(String),
    /// 4xx rejection; retrying cannot change an auth/validation failure
    Rejected(String),
    /// Parseable transport, unusable payload; never retried
    Shape(String),
}

/// HTTP client for the remote classification service.
///
/// Holds only read-only state (endpoint, credential, template, policy), so a
/// single instance is safely shared across all concurrent workers.
pub struct ClassificationClient {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    template: String,
    retry: RetryPolicy,
}

impl ClassificationClient {
    pub fn new(config: &JobConfig, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            token,
            template: config.prompt_template.clone(),
            retry: config.retry.clone(),
        })
    }

    /// One POST to the endpoint, classified into success or a `CallError`.
    async fn send_once(&self, prompt: &str) -> std::result::Result<String, CallError> {
        let request = ChatRequest {
            chat_id: Uuid::new_v4().to_string(),
            stream: false,
            detail: false,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CallError::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(CallError::Transient(format!("server returned {status}")));
        }
        if !status.is_success() {
            return Err(CallError::Rejected(format!("server returned {status}")));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| CallError::Shape(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| CallError::Shape("no message content in choices".to_string()))
    }
}

#[async_trait]
impl Classify for ClassificationClient {
    async fn classify(&self, row: &Row) -> Outcome {
        let prompt = render_prompt(&self.template, row);
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match self.send_once(&prompt).await {
                Ok(content) => {
                    tracing::debug!(row = row.index(), attempt, "classification succeeded");
                    return Outcome::Classified(normalize_quotes(&content));
                }
                Err(CallError::Shape(reason)) => {
                    tracing::warn!(row = row.index(), reason = %reason, "unusable response payload");
                    return Outcome::Failed("invalid response shape".to_string());
                }
                Err(CallError::Rejected(reason)) => {
                    tracing::warn!(row = row.index(), reason = %reason, "request rejected");
                    return Outcome::Failed("request error".to_string());
                }
                Err(CallError::Transient(reason)) => {
                    if attempt >= self.retry.max_attempts {
                        tracing::warn!(
                            row = row.index(),
                            attempt,
                            reason = %reason,
                            "remote call failed, retries exhausted"
                        );
                        return Outcome::Failed("request error".to_string());
                    }

                    let backoff = self.retry.delay_after(attempt);
                    tracing::debug!(
                        row = row.index(),
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        reason = %reason,
                        "transient failure, will retry after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// Interpolate a row's fields into the prompt template, then sanitize.
pub fn render_prompt(template: &str, row: &Row) -> String {
    let mut prompt = template.to_string();
    for (placeholder, column) in PLACEHOLDERS {
        if let Some(value) = row.get(column) {
            prompt = prompt.replace(placeholder, value);
        }
    }
    sanitize(&prompt)
}

/// NFC-normalize and strip control characters so malformed input encoding
/// cannot corrupt the wire payload. Line breaks and tabs become spaces.
fn sanitize(text: &str) -> String {
    text.nfc()
        .map(|c| if c == '\n' || c == '\r' || c == '\t' { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect()
}

/// Unify single quotes to double quotes, as the downstream tabular writer
/// quotes with `"` and mixed quoting in the model's answer has been observed
/// to confuse consumers of the output file.
fn normalize_quotes(content: &str) -> String {
    content.replace('\'', "\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::REQUIRED_COLUMNS;
    use std::sync::Arc;

    fn row_with(name: &str, rules: &str) -> Row {
        let header: Vec<String> = REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let values = vec![
            name.to_string(),
            "scan".to_string(),
            rules.to_string(),
            "aliyun".to_string(),
            "config".to_string(),
            "content".to_string(),
            "desc".to_string(),
        ];
        Row::new(0, Arc::new(header), values)
    }

    #[test]
    fn test_render_prompt_interpolates_fields() {
        let row = row_with("ecs-open-port", "deny 22");
        let prompt = render_prompt("Item {name} with rule {rules} on {cloud_platform}.", &row);
        assert_eq!(prompt, "Item ecs-open-port with rule deny 22 on aliyun.");
    }

    #[test]
    fn test_render_prompt_leaves_unknown_placeholders() {
        let row = row_with("a", "b");
        let prompt = render_prompt("{name} {unknown}", &row);
        assert_eq!(prompt, "a {unknown}");
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize("a\u{0000}b\u{0007}c"), "abc");
        assert_eq!(sanitize("line1\nline2\tend"), "line1 line2 end");
    }

    #[test]
    fn test_sanitize_applies_nfc() {
        // e + combining acute accent composes to é
        assert_eq!(sanitize("e\u{0301}"), "\u{00e9}");
    }

    #[test]
    fn test_normalize_quotes() {
        assert_eq!(
            normalize_quotes("[{'isoStandard': 'ISO 27001'}]"),
            r#"[{"isoStandard": "ISO 27001"}]"#
        );
    }

    #[test]
    fn test_response_shape_parsing() {
        let full: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"X - reason"}}]}"#).unwrap();
        assert_eq!(
            full.choices[0].message.as_ref().unwrap().content.as_deref(),
            Some("X - reason")
        );

        let empty: ChatResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(empty.choices.is_empty());

        let missing: ChatResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert!(missing.choices.is_empty());
    }

    #[test]
    fn test_request_serializes_with_camel_case_session_id() {
        let request = ChatRequest {
            chat_id: "abc".to_string(),
            stream: false,
            detail: false,
            messages: vec![ChatMessage {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chatId"], "abc");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
