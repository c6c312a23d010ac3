use crate::{
    config::AnthropicInstanceConfig,
    error::{AppError, Result},
    logging::SensitiveApiKey,
    models::{
        anthropic::{Message, MessagesRequest, MessagesResponse},
        ChatRequest, ChatResponse, FinishReason, Role, TokenUsage,
    },
    providers::{check_status, resolve_model, transport_error, LlmProvider},
    streaming::{anthropic_text_stream, TextStream},
};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";

/// Anthropic Messages API adapter
pub struct AnthropicProvider {
    config: AnthropicInstanceConfig,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicInstanceConfig, client: Client) -> Self {
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .timeout(Duration::from_secs(self.config.timeout_seconds))
    }

    /// System messages are lifted into the top-level `system` field
    fn build_request(&self, request: &ChatRequest, stream: bool) -> MessagesRequest {
        let system: Vec<&str> = request
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| Message {
                role: match m.role {
                    Role::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect();

        MessagesRequest {
            model: resolve_model(request, self.config.default_model.as_deref(), DEFAULT_MODEL),
            system: (!system.is_empty()).then(|| system.join("\n\n")),
            messages,
            max_tokens: request.params.max_tokens,
            temperature: Some(request.params.temperature),
            top_p: request.params.top_p,
            stream: stream.then_some(true),
            stop_sequences: (!request.params.stop.is_empty()).then(|| request.params.stop.clone()),
        }
    }

    async fn post(&self, body: &MessagesRequest) -> Result<reqwest::Response> {
        let response = self
            .with_auth(self.client.post(self.url("messages")))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&self.config.name, e))?;

        check_status(&self.config.name, response).await
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> &str {
        "anthropic"
    }

    async fn initialize(&self) -> Result<()> {
        debug!(
            provider = %self.config.name,
            api_key = %SensitiveApiKey::new(&self.config.api_key),
            "Checking provider connectivity"
        );

        let response = self
            .with_auth(self.client.get(self.url("models")))
            .send()
            .await
            .map_err(|e| transport_error(&self.config.name, e))?;

        check_status(&self.config.name, response).await?;

        info!(provider = %self.config.name, provider_type = "anthropic", "Provider initialized");
        Ok(())
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request(request, false);
        let started = Instant::now();

        let response = self.post(&body).await?;
        let message: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AppError::ConversionError(format!("{}: invalid response body: {}", self.config.name, e)))?;

        let content = message
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("");

        Ok(ChatResponse {
            content,
            model: message.model,
            usage: TokenUsage {
                input_tokens: message.usage.input_tokens,
                output_tokens: message.usage.output_tokens,
            },
            finish_reason: map_stop_reason(message.stop_reason.as_deref()),
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: self.config.name.clone(),
        })
    }

    async fn generate_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let body = self.build_request(request, true);
        let response = self.post(&body).await?;
        Ok(anthropic_text_stream(response, self.config.name.clone()))
    }
}

fn map_stop_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChatMessage;

    fn create_test_provider() -> AnthropicProvider {
        AnthropicProvider::new(
            AnthropicInstanceConfig {
                name: "claude".to_string(),
                enabled: true,
                api_key: "sk-ant-test".to_string(),
                base_url: "https://api.anthropic.com".to_string(),
                timeout_seconds: 30,
                api_version: "2023-06-01".to_string(),
                default_model: None,
            },
            Client::new(),
        )
    }

    #[test]
    fn test_system_messages_are_lifted() {
        let provider = create_test_provider();
        let request = ChatRequest::new(
            "claude-3-opus-20240229",
            vec![
                ChatMessage::system("Rule one."),
                ChatMessage::user("Hi"),
                ChatMessage::assistant("Hello"),
                ChatMessage::system("Rule two."),
            ],
        );

        let body = provider.build_request(&request, false);
        assert_eq!(body.system.as_deref(), Some("Rule one.\n\nRule two."));
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[1].role, "assistant");
        assert_eq!(body.stream, None);
        assert_eq!(body.max_tokens, 1000);
    }

    #[test]
    fn test_default_model_and_stream_flag() {
        let provider = create_test_provider();
        let request = ChatRequest::new("", vec![ChatMessage::user("Hi")]);
        let body = provider.build_request(&request, true);
        assert_eq!(body.model, DEFAULT_MODEL);
        assert_eq!(body.stream, Some(true));
        assert!(body.system.is_none());
    }

    #[test]
    fn test_map_stop_reason() {
        assert_eq!(map_stop_reason(Some("end_turn")), FinishReason::Stop);
        assert_eq!(map_stop_reason(Some("stop_sequence")), FinishReason::Stop);
        assert_eq!(map_stop_reason(Some("max_tokens")), FinishReason::Length);
        assert_eq!(map_stop_reason(Some("tool_use")), FinishReason::ToolCalls);
    }

    #[test]
    fn test_url() {
        assert_eq!(create_test_provider().url("messages"), "https://api.anthropic.com/v1/messages");
    }
}
