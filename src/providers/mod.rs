pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAIProvider;

use crate::config::ProvidersConfig;
use crate::error::{AppError, Result};
use crate::models::{ChatRequest, ChatResponse};
use crate::streaming::TextStream;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;

/// Uniform interface over a remote LLM vendor's chat API.
///
/// Each implementation encapsulates:
/// - URL construction
/// - Authentication headers
/// - Request shaping and response parsing
/// - Error classification by HTTP status
#[async_trait]
pub trait LlmProvider: Send + Sync + 'static {
    /// Instance name from configuration, unique across providers
    fn name(&self) -> &str;

    /// Vendor type (e.g. "openai", "deepseek", "anthropic")
    fn provider_type(&self) -> &str;

    /// Lightweight connectivity check; fails fast on bad credentials
    async fn initialize(&self) -> Result<()>;

    async fn generate(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Stream text chunks as they arrive
    async fn generate_stream(&self, request: &ChatRequest) -> Result<TextStream>;
}

/// Build adapters for every enabled provider instance, sharing one HTTP client
pub fn build_providers(config: &ProvidersConfig) -> Result<Vec<Arc<dyn LlmProvider>>> {
    let client = Client::builder()
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

    let mut providers: Vec<Arc<dyn LlmProvider>> = Vec::new();

    for instance in config.openai.iter().filter(|i| i.enabled) {
        providers.push(Arc::new(OpenAIProvider::new(
            "openai",
            instance.clone(),
            client.clone(),
        )));
    }
    for instance in config.deepseek.iter().filter(|i| i.enabled) {
        providers.push(Arc::new(OpenAIProvider::new(
            "deepseek",
            instance.clone(),
            client.clone(),
        )));
    }
    for instance in config.anthropic.iter().filter(|i| i.enabled) {
        providers.push(Arc::new(AnthropicProvider::new(instance.clone(), client.clone())));
    }

    Ok(providers)
}

/// Pass successful responses through; classify everything else
pub(crate) async fn check_status(provider: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(AppError::from_status(provider, status.as_u16(), &body, retry_after))
}

/// Unreachable hosts and timeouts are attributed to the provider as outages
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> AppError {
    if error.is_connect() || error.is_timeout() {
        AppError::ServiceUnavailable {
            provider: provider.to_string(),
            message: error.to_string(),
        }
    } else {
        AppError::HttpRequest(error)
    }
}

/// Requests without a model use the instance's configured default
pub(crate) fn resolve_model(request: &ChatRequest, default_model: Option<&str>, fallback: &str) -> String {
    if !request.model.is_empty() {
        return request.model.clone();
    }
    default_model.unwrap_or(fallback).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AnthropicInstanceConfig, ProviderInstanceConfig};
    use crate::models::ChatMessage;

    fn instance(name: &str, enabled: bool) -> ProviderInstanceConfig {
        ProviderInstanceConfig {
            name: name.to_string(),
            enabled,
            api_key: "sk-test".to_string(),
            base_url: "http://localhost:1".to_string(),
            timeout_seconds: 5,
            default_model: None,
        }
    }

    #[test]
    fn test_build_providers_skips_disabled() {
        let config = ProvidersConfig {
            openai: vec![instance("oa-1", true), instance("oa-2", false)],
            deepseek: vec![instance("ds", true)],
            anthropic: vec![AnthropicInstanceConfig {
                name: "claude".to_string(),
                enabled: true,
                api_key: "sk-ant-test".to_string(),
                base_url: "http://localhost:1".to_string(),
                timeout_seconds: 5,
                api_version: "2023-06-01".to_string(),
                default_model: None,
            }],
        };

        let providers = build_providers(&config).unwrap();
        let names: Vec<_> = providers.iter().map(|p| (p.name(), p.provider_type())).collect();
        assert_eq!(
            names,
            vec![("oa-1", "openai"), ("ds", "deepseek"), ("claude", "anthropic")]
        );
    }

    #[test]
    fn test_resolve_model() {
        let explicit = ChatRequest::new("gpt-4", vec![ChatMessage::user("hi")]);
        assert_eq!(resolve_model(&explicit, Some("other"), "fallback"), "gpt-4");

        let blank = ChatRequest::new("", vec![ChatMessage::user("hi")]);
        assert_eq!(resolve_model(&blank, Some("deepseek-chat"), "fallback"), "deepseek-chat");
        assert_eq!(resolve_model(&blank, None, "fallback"), "fallback");
    }
}
