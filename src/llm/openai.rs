//! OpenAI-compatible chat-completions backend
//!
//! Serves both hosted OpenAI endpoints and local OpenAI-compatible servers
//! (ollama, llama.cpp, vllm) via `base_url`.

use async_stream::stream;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{LanguageModel, TextStream};
use crate::config::LlmServiceConfig;
use crate::error::{Error, Result};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible backend
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiBackend {
    /// Create a backend from a service configuration
    pub fn new(config: &LlmServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(OpenAiBackend {
            client,
            base_url: config
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    fn request(&self, prompt: &str, stream: bool) -> reqwest::RequestBuilder {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
        };

        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }
        builder
    }
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.max_tokens as usize
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("chat completion: model={}", self.model);
        let response = self.request(prompt, false).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => Error::RateLimit(error_text),
                401 => Error::Unauthorized("Invalid API key".to_string()),
                _ => Error::Model(format!("API error ({}): {}", status, error_text)),
            });
        }

        let body: ChatCompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        Ok(content)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        debug!("streamed chat completion: model={}", self.model);
        let response = self.request(prompt, true).send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(Error::Model(format!(
                "API error ({}): {}",
                status, error_text
            )));
        }

        let events = response.bytes_stream().eventsource();
        let output = stream! {
            futures::pin_mut!(events);
            while let Some(event) = events.next().await {
                match event {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            break;
                        }
                        match serde_json::from_str::<ChatCompletionChunk>(&event.data) {
                            Ok(chunk) => {
                                if let Some(delta) = chunk
                                    .choices
                                    .into_iter()
                                    .next()
                                    .and_then(|choice| choice.delta.content)
                                {
                                    if !delta.is_empty() {
                                        yield Ok(delta);
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("unparseable stream chunk: {}", e);
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(Error::Model(format!("stream error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(output))
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(base_url: &str) -> OpenAiBackend {
        OpenAiBackend::new(&LlmServiceConfig {
            service_type: crate::config::LlmServiceType::Openai,
            api_key: Some(SecretString::from("test-key")),
            base_url: Some(base_url.to_string()),
            model: "gpt-test".into(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn generate_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"model": "gpt-test"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"role": "assistant", "content": "[]"}}]
            })))
            .mount(&server)
            .await;

        let backend = backend(&server.uri());
        let text = backend.generate("plan").await.unwrap();
        assert_eq!(text, "[]");
    }

    #[tokio::test]
    async fn generate_maps_http_statuses_to_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let backend = backend(&server.uri());
        let error = backend.generate("plan").await.unwrap_err();
        assert!(matches!(error, Error::RateLimit(_)));
    }

    #[tokio::test]
    async fn stream_yields_deltas_until_done() {
        let server = MockServer::start().await;
        let sse_body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(sse_body),
            )
            .mount(&server)
            .await;

        let backend = backend(&server.uri());
        let mut stream = backend.generate_stream("summarize").await.unwrap();
        let mut collected = String::new();
        while let Some(chunk) = stream.next().await {
            collected.push_str(&chunk.unwrap());
        }
        assert_eq!(collected, "hello");
    }
}
