use crate::{
    config::ProviderInstanceConfig,
    error::{AppError, Result},
    logging::SensitiveApiKey,
    models::{
        openai::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage as WireMessage},
        ChatRequest, ChatResponse, FinishReason, TokenUsage,
    },
    providers::{check_status, resolve_model, transport_error, LlmProvider},
    streaming::{openai_text_stream, TextStream},
};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// OpenAI Chat Completions adapter (also used for OpenAI-compatible vendors such as DeepSeek)
pub struct OpenAIProvider {
    provider_type: &'static str,
    config: ProviderInstanceConfig,
    client: Client,
}

impl OpenAIProvider {
    pub fn new(provider_type: &'static str, config: ProviderInstanceConfig, client: Client) -> Self {
        Self {
            provider_type,
            config,
            client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build_request(&self, request: &ChatRequest, stream: bool) -> ChatCompletionRequest {
        let fallback = if self.provider_type == "deepseek" {
            "deepseek-chat"
        } else {
            DEFAULT_MODEL
        };

        ChatCompletionRequest {
            model: resolve_model(request, self.config.default_model.as_deref(), fallback),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role.as_str().to_string(),
                    content: Some(m.content.clone()),
                })
                .collect(),
            max_tokens: Some(request.params.max_tokens),
            temperature: Some(request.params.temperature),
            top_p: request.params.top_p,
            stream: Some(stream),
            stop: (!request.params.stop.is_empty()).then(|| request.params.stop.clone()),
        }
    }

    async fn post(&self, body: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url("chat/completions"))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .json(body)
            .send()
            .await
            .map_err(|e| transport_error(&self.config.name, e))?;

        check_status(&self.config.name, response).await
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn provider_type(&self) -> &str {
        self.provider_type
    }

    async fn initialize(&self) -> Result<()> {
        debug!(
            provider = %self.config.name,
            api_key = %SensitiveApiKey::new(&self.config.api_key),
            "Checking provider connectivity"
        );

        let response = self
            .client
            .get(self.url("models"))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await
            .map_err(|e| transport_error(&self.config.name, e))?;

        check_status(&self.config.name, response).await?;

        info!(provider = %self.config.name, provider_type = self.provider_type, "Provider initialized");
        Ok(())
    }

    async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let body = self.build_request(request, false);
        let started = Instant::now();

        let response = self.post(&body).await?;
        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AppError::ConversionError(format!("{}: invalid response body: {}", self.config.name, e)))?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| {
            AppError::ConversionError(format!("{}: response contained no choices", self.config.name))
        })?;

        let usage = completion
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            model: completion.model,
            usage,
            finish_reason: map_finish_reason(choice.finish_reason.as_deref()),
            response_time_ms: started.elapsed().as_millis() as u64,
            provider: self.config.name.clone(),
        })
    }

    async fn generate_stream(&self, request: &ChatRequest) -> Result<TextStream> {
        let body = self.build_request(request, true);
        let response = self.post(&body).await?;
        Ok(openai_text_stream(response, self.config.name.clone()))
    }
}

fn map_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("tool_calls") | Some("function_call") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChatMessage, GenerationParams};

    fn create_test_provider(provider_type: &'static str, default_model: Option<&str>) -> OpenAIProvider {
        OpenAIProvider::new(
            provider_type,
            ProviderInstanceConfig {
                name: "test-instance".to_string(),
                enabled: true,
                api_key: "sk-test-key".to_string(),
                base_url: "https://api.openai.com/v1/".to_string(),
                timeout_seconds: 30,
                default_model: default_model.map(str::to_string),
            },
            Client::new(),
        )
    }

    #[test]
    fn test_build_request_maps_params() {
        let provider = create_test_provider("openai", None);
        let request = ChatRequest::new(
            "gpt-4",
            vec![ChatMessage::system("Be brief."), ChatMessage::user("Hello!")],
        )
        .with_params(GenerationParams {
            max_tokens: 64,
            temperature: 0.2,
            top_p: Some(0.9),
            stop: vec!["\n\n".to_string()],
        });

        let body = provider.build_request(&request, false);
        assert_eq!(body.model, "gpt-4");
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.max_tokens, Some(64));
        assert_eq!(body.top_p, Some(0.9));
        assert_eq!(body.stop, Some(vec!["\n\n".to_string()]));
        assert_eq!(body.stream, Some(false));
    }

    #[test]
    fn test_build_request_default_model() {
        let blank = ChatRequest::new("", vec![ChatMessage::user("hi")]);

        let deepseek = create_test_provider("deepseek", None);
        assert_eq!(deepseek.build_request(&blank, true).model, "deepseek-chat");

        let configured = create_test_provider("openai", Some("gpt-4-turbo"));
        assert_eq!(configured.build_request(&blank, true).model, "gpt-4-turbo");
        assert!(configured.build_request(&blank, true).stop.is_none());
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let provider = create_test_provider("openai", None);
        assert_eq!(provider.url("models"), "https://api.openai.com/v1/models");
    }

    #[test]
    fn test_map_finish_reason() {
        assert_eq!(map_finish_reason(Some("stop")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("length")), FinishReason::Length);
        assert_eq!(map_finish_reason(Some("tool_calls")), FinishReason::ToolCalls);
        assert_eq!(map_finish_reason(None), FinishReason::Stop);
    }
}
