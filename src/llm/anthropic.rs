//! Anthropic messages backend

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

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

/// Anthropic messages backend
pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl AnthropicBackend {
    /// Create a backend from a service configuration
    pub fn new(config: &LlmServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(AnthropicBackend {
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
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream,
            messages: vec![RequestMessage {
                role: "user",
                content: prompt,
            }],
        };

        let mut builder = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header(header::CONTENT_TYPE, "application/json")
            .header("anthropic-version", API_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }
        builder
    }
}

#[async_trait::async_trait]
impl LanguageModel for AnthropicBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn context_window(&self) -> usize {
        self.max_tokens as usize
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("messages request: model={}", self.model);
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

        let body: MessagesResponse = response.json().await?;
        let text = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("");
        Ok(text)
    }

    async fn generate_stream(&self, prompt: &str) -> Result<TextStream> {
        debug!("streamed messages request: model={}", self.model);
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
                    Ok(event) => match serde_json::from_str::<StreamEvent>(&event.data) {
                        Ok(StreamEvent::ContentBlockDelta { delta }) => {
                            if let Some(text) = delta.text {
                                if !text.is_empty() {
                                    yield Ok(text);
                                }
                            }
                        }
                        Ok(StreamEvent::MessageStop) => break,
                        Ok(StreamEvent::Other) => {}
                        Err(e) => {
                            warn!("unparseable stream event: {}", e);
                        }
                    },
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum StreamEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: StreamDelta },
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: Option<String>,
}
