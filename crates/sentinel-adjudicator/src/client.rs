//! Chat-completions client for threat adjudication.
//!
//! Sends the full frame and the candidate crop as JPEG data URLs and asks
//! for a strict-JSON verdict.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{AdjudicatorError, AdjudicatorResult};

pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";
/// Hard timeout for the outbound call.
pub const LLM_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for the LLM client.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_url: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_LLM_MODEL.to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            timeout: LLM_TIMEOUT,
        }
    }
}

impl LlmConfig {
    /// Create config from environment variables. `OPENAI_API_KEY` wins over
    /// `OPENAI_API_KEY_FALLBACK`; first non-empty value is used.
    pub fn from_env() -> Self {
        let api_key = ["OPENAI_API_KEY", "OPENAI_API_KEY_FALLBACK"]
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());

        Self {
            api_key,
            model: std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string()),
            api_url: std::env::var("OPENAI_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            timeout: LLM_TIMEOUT,
        }
    }
}

/// Parsed adjudication verdict.
#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub false_positive: bool,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub reason: Option<String>,
}

pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> AdjudicatorResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AdjudicatorError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> AdjudicatorResult<Self> {
        Self::new(LlmConfig::from_env())
    }

    pub fn has_api_key(&self) -> bool {
        self.config.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Ask whether a flagged detection is a false positive.
    pub async fn adjudicate(
        &self,
        label: &str,
        full_jpeg: &[u8],
        crop_jpeg: &[u8],
    ) -> AdjudicatorResult<Verdict> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(AdjudicatorError::MissingApiKey)?;

        let payload = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are an expert security analyst helping filter false positives.",
                },
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": verdict_prompt(label)},
                        {"type": "image_url", "image_url": {"url": data_url(full_jpeg)}},
                        {"type": "image_url", "image_url": {"url": data_url(crop_jpeg)}},
                    ],
                },
            ],
            "temperature": 0.2,
            "response_format": {"type": "json_object"},
            "max_tokens": 200,
        });

        let response = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdjudicatorError::Timeout
                } else {
                    AdjudicatorError::Network(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            let truncated = body.chars().take(200).collect::<String>();
            warn!(status, body = %truncated, "LLM API error");
            return Err(AdjudicatorError::Api {
                status,
                body: truncated,
            });
        }

        let data: serde_json::Value = response.json().await.map_err(AdjudicatorError::Network)?;
        let content = data["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default();

        let verdict: Verdict = serde_json::from_str(content).map_err(|_| {
            warn!(content, "LLM content was not the requested JSON");
            AdjudicatorError::NonJson(content.chars().take(200).collect())
        })?;
        info!(
            false_positive = verdict.false_positive,
            reason = verdict.reason.as_deref().unwrap_or(""),
            "LLM verdict"
        );
        Ok(verdict)
    }
}

fn verdict_prompt(label: &str) -> String {
    format!(
        "You are a security assistant. A vision model flagged a potential threat or suspicious object/person.\n\
         Vision label: {label}.\n\
         Provide a binary decision ONLY. Respond strictly as JSON with: false_positive (boolean), reason (string).\n\
         Rules for reason: keep it to one short sentence (<= 18 words), \
         be specific about what is seen (e.g., 'metallic knife-like object', 'toy gun', 'cell phone'), \
         and include minimal context if obvious (e.g., 'in hand', 'on table', 'reflection')."
    )
}

fn data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_response(content: &str) -> serde_json::Value {
        serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": content}}]
        })
    }

    async fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new(LlmConfig {
            api_key: Some("test-key".to_string()),
            api_url: format!("{}/v1/chat/completions", server.uri()),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_adjudicate_parses_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
                r#"{"false_positive": true, "confidence": 0.9, "reason": "toy knife"}"#,
            )))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let verdict = client.adjudicate("knife", b"full", b"crop").await.unwrap();
        assert!(verdict.false_positive);
        assert_eq!(verdict.confidence, Some(0.9));
        assert_eq!(verdict.reason.as_deref(), Some("toy knife"));
    }

    #[tokio::test]
    async fn test_http_error_is_reported_not_parsed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.adjudicate("gun", b"full", b"crop").await.unwrap_err();
        assert!(matches!(err, AdjudicatorError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_non_json_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(chat_response("I think this is probably fine.")),
            )
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let err = client.adjudicate("gun", b"full", b"crop").await.unwrap_err();
        assert!(matches!(err, AdjudicatorError::NonJson(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_short_circuits() {
        let client = LlmClient::new(LlmConfig::default()).unwrap();
        let err = client.adjudicate("gun", b"full", b"crop").await.unwrap_err();
        assert!(matches!(err, AdjudicatorError::MissingApiKey));
    }
}
