//! Advisory API Client
//!
//! HTTP client for an OpenAI-compatible chat completions endpoint, exposed to
//! the workflow as an `AdvisoryOracle`.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::*;
use super::prompt::{build_user_prompt, fallback_verdict, parse_verdict, SYSTEM_PROMPT};
use crate::signal_core::{AdvisoryOracle, AdvisoryVerdict, BiasLabel, SignalError};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Model settings for advisory calls
#[derive(Debug, Clone)]
pub struct AdvisorySettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for AdvisorySettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            max_tokens: 150,
        }
    }
}

#[derive(Debug, Error)]
enum CompletionError {
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct AdvisoryClient {
    client: Client,
    base_url: String,
    api_key: String,
    settings: AdvisorySettings,
}

impl AdvisoryClient {
    pub fn new(api_key: String, base_url: String, settings: AdvisorySettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            settings,
        })
    }

    async fn complete(&self, user_prompt: &str) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages: vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user_prompt)],
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let quota = status == StatusCode::TOO_MANY_REQUESTS
                || serde_json::from_str::<ErrorEnvelope>(&body)
                    .map(|e| e.error.is_quota())
                    .unwrap_or(false)
                || body.contains("insufficient_quota");
            if quota {
                return Err(CompletionError::QuotaExceeded(format!("{}: {}", status, body)));
            }
            return Err(anyhow!("Chat completion failed with status {}: {}", status, body).into());
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion response")?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or_else(|| anyhow!("Chat completion returned no choices"))?;

        Ok(content)
    }
}

#[async_trait]
impl AdvisoryOracle for AdvisoryClient {
    async fn evaluate(&self, bias: &BiasLabel, context: &str) -> AdvisoryVerdict {
        let prompt = build_user_prompt(bias, context);
        debug!("Advisory prompt:\n{}", prompt);

        match self.complete(&prompt).await {
            Ok(text) => {
                debug!("Advisory response:\n{}", text);
                parse_verdict(&text)
            }
            Err(CompletionError::QuotaExceeded(detail)) => {
                info!("Advisory quota exceeded ({}); using fallback rule", detail);
                fallback_verdict(bias)
            }
            Err(CompletionError::Other(e)) => {
                let err = SignalError::Advisory(format!("{:#}", e));
                warn!("{}", err);
                AdvisoryVerdict::error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::prompt::test_support::label;
    use super::*;
    use crate::signal_core::{AdvisoryDecision, Bias, ClosureStrength};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(uri: String) -> AdvisoryClient {
        AdvisoryClient::new("sk-test".to_string(), uri, AdvisorySettings::default()).unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn test_approve_from_completion() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 150
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion("DECISION: YES\nREASON: Clean confluence.")),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let verdict = client(mock_server.uri())
            .evaluate(&label(Bias::Buy, ClosureStrength::Strong), "")
            .await;

        assert_eq!(verdict.decision, AdvisoryDecision::Approve);
        assert_eq!(verdict.rationale, "Clean confluence.");
    }

    #[tokio::test]
    async fn test_quota_exhaustion_uses_fallback() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {
                    "message": "You exceeded your current quota",
                    "type": "insufficient_quota",
                    "code": "insufficient_quota"
                }
            })))
            .mount(&mock_server)
            .await;

        let advisor = client(mock_server.uri());
        let buy = advisor
            .evaluate(&label(Bias::Buy, ClosureStrength::Strong), "")
            .await;
        let sell = advisor
            .evaluate(&label(Bias::Sell, ClosureStrength::Strong), "")
            .await;

        assert_eq!(buy.decision, AdvisoryDecision::Approve);
        assert!(buy.rationale.starts_with("FALLBACK:"));
        assert_eq!(sell.decision, AdvisoryDecision::Reject);
    }

    #[tokio::test]
    async fn test_server_error_is_error_verdict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
            .mount(&mock_server)
            .await;

        let verdict = client(mock_server.uri())
            .evaluate(&label(Bias::Buy, ClosureStrength::Strong), "")
            .await;

        assert_eq!(verdict.decision, AdvisoryDecision::Error);
        assert!(verdict.rationale.contains("500"));
    }

    #[tokio::test]
    async fn test_unparseable_completion_is_error_verdict() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Looks fine to me.")))
            .mount(&mock_server)
            .await;

        let verdict = client(mock_server.uri())
            .evaluate(&label(Bias::Sell, ClosureStrength::Strong), "")
            .await;

        assert_eq!(verdict.decision, AdvisoryDecision::Error);
    }
}
