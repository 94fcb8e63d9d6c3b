//! OpenAI-compatible chat-completions adapter.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use sitesmith_shared::{LlmConfig, Result, SitesmithError};

use crate::TextGenerator;

/// User-Agent string for generation requests.
const USER_AGENT: &str = concat!("sitesmith/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Chat-completions client with a fixed model and temperature.
///
/// Built once per process and shared by every stage of a run.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl std::fmt::Debug for ChatCompletionsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsClient {
    /// Create a client from the `[llm]` config section and a loaded API key.
    pub fn new(config: &LlmConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| SitesmithError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    /// Full URL requests are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SitesmithError::Generation(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(SitesmithError::Generation(format!(
                "HTTP {status}: {}",
                &text[..floor_char_boundary(&text, 300)]
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| SitesmithError::Generation(format!("invalid response body: {e}")))?;

        if let Some(usage) = &parsed.usage {
            debug!(
                tokens_in = usage.prompt_tokens,
                tokens_out = usage.completion_tokens,
                "token usage"
            );
        }

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| SitesmithError::Generation("response contained no content".into()))
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionsClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(SitesmithError::Generation("prompt is empty".into()));
        }

        let start = Instant::now();
        let text = self.call(prompt).await?;

        info!(
            latency_ms = start.elapsed().as_millis(),
            response_len = text.len(),
            "generation complete"
        );
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Largest index `<= max` that falls on a char boundary of `s`.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> LlmConfig {
        LlmConfig {
            base_url: format!("{}/v1/", server.uri()),
            ..LlmConfig::default()
        }
    }

    #[test]
    fn endpoint_joins_base_url() {
        let config = LlmConfig::default();
        let client = ChatCompletionsClient::new(&config, "k".into()).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://dashscope.aliyuncs.com/compatible-mode/v1/chat/completions"
        );
        assert_eq!(client.model(), "qwen-turbo");
    }

    #[test]
    fn debug_hides_api_key() {
        let client = ChatCompletionsClient::new(&LlmConfig::default(), "sk-secret".into()).unwrap();
        let printed = format!("{client:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("qwen-turbo"));
    }

    #[test]
    fn char_boundary_truncation() {
        assert_eq!(floor_char_boundary("abc", 10), 3);
        // 'é' is two bytes; index 1 is inside it
        assert_eq!(floor_char_boundary("éa", 1), 0);
    }

    #[tokio::test]
    async fn generate_returns_first_choice() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "qwen-turbo",
                "messages": [{"role": "user", "content": "plan a site"}],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [
                    {"message": {"role": "assistant", "content": "1. Build index"}},
                    {"message": {"role": "assistant", "content": "ignored"}}
                ],
                "usage": {"prompt_tokens": 5, "completion_tokens": 4}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "test-key".into()).unwrap();
        let text = client.generate("plan a site").await.unwrap();
        assert_eq!(text, "1. Build index");
    }

    #[tokio::test]
    async fn service_error_is_generation_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "bad".into()).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, SitesmithError::Generation(_)));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn empty_choices_is_generation_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "k".into()).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(err.to_string().contains("no content"));
    }

    #[tokio::test]
    async fn null_content_is_generation_failure() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": null}}]
            })))
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "k".into()).unwrap();
        assert!(client.generate("hello").await.is_err());
    }

    #[tokio::test]
    async fn empty_prompt_sends_nothing() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = ChatCompletionsClient::new(&config_for(&server), "k".into()).unwrap();
        assert!(client.generate("   ").await.is_err());
    }

    #[tokio::test]
    async fn unreachable_service_is_generation_failure() {
        let config = LlmConfig {
            base_url: "http://127.0.0.1:9".into(),
            connect_timeout_secs: 1,
            ..LlmConfig::default()
        };
        let client = ChatCompletionsClient::new(&config, "k".into()).unwrap();
        let err = client.generate("hello").await.unwrap_err();
        assert!(matches!(err, SitesmithError::Generation(_)));
    }
}
