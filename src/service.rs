use crate::cache::{fingerprint, CacheStats};
use crate::config::RateLimitConfig;
use crate::error::{AppError, Result};
use crate::manager::{ProviderManager, ProviderSnapshot};
use crate::models::{ChatRequest, ChatResponse};
use crate::optimizer::CostOptimizer;
use crate::rate_limit::RateLimiter;
use crate::streaming::TextStream;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::debug;
use uuid::Uuid;

const MAX_PROMPT_CHARS: usize = 50_000;
const MAX_TOKENS_LIMIT: u32 = 32_000;

/// Service type under which chat completions are billed
pub const CHAT_SERVICE: &str = "llm";

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStats {
    pub cache: CacheStats,
    pub providers: Vec<ProviderSnapshot>,
    pub timestamp: DateTime<Local>,
}

/// Request facade: validation, per-user rate limiting, response caching,
/// provider dispatch and cost accounting
pub struct AiService {
    manager: Arc<ProviderManager>,
    optimizer: Arc<CostOptimizer>,
    rate_limiter: RateLimiter,
}

impl AiService {
    pub fn new(manager: Arc<ProviderManager>, optimizer: Arc<CostOptimizer>) -> Self {
        Self {
            manager,
            optimizer,
            rate_limiter: RateLimiter::new(&RateLimitConfig::default()),
        }
    }

    pub fn with_rate_limit(mut self, config: &RateLimitConfig) -> Self {
        self.rate_limiter = RateLimiter::new(config);
        self
    }

    pub fn optimizer(&self) -> &CostOptimizer {
        &self.optimizer
    }

    pub fn manager(&self) -> &ProviderManager {
        &self.manager
    }

    pub async fn process(&self, request: &ChatRequest, preferred: Option<&str>) -> Result<ChatResponse> {
        validate(request)?;
        self.rate_limiter.check(request.user_id.as_deref())?;

        let request_id = Uuid::new_v4();
        let key = fingerprint(request);
        if let Some(cached) = self.optimizer.get_cached_response(&key) {
            debug!(%request_id, model = %request.model, "Serving response from cache");
            return Ok(cached);
        }

        let response = self.manager.generate(request, preferred).await?;

        // Vendors answer with dated snapshot names; spend is billed under the requested model
        let billed_model = if request.model.is_empty() {
            response.model.as_str()
        } else {
            request.model.as_str()
        };
        let cost = self.optimizer.record_cost(
            CHAT_SERVICE,
            billed_model,
            response.usage.input_tokens,
            response.usage.output_tokens,
            1,
            Some(serde_json::json!({
                "request_id": request_id.to_string(),
                "provider": response.provider,
                "served_model": response.model,
            })),
        );
        self.optimizer.cache_response(&key, response.clone());

        debug!(
            %request_id,
            provider = %response.provider,
            model = %response.model,
            tokens = response.usage.total(),
            cost_usd = cost,
            "Request completed"
        );
        Ok(response)
    }

    /// Streamed responses bypass the cache and carry no usage to bill
    pub async fn process_stream(&self, request: &ChatRequest, preferred: Option<&str>) -> Result<TextStream> {
        validate(request)?;
        self.rate_limiter.check(request.user_id.as_deref())?;
        self.manager.generate_stream(request, preferred).await
    }

    /// Process requests with at most `max_concurrent` in flight; results keep input order
    pub async fn batch_process(&self, requests: &[ChatRequest], max_concurrent: usize) -> Vec<Result<ChatResponse>> {
        let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));

        let tasks = requests.iter().map(|request| {
            let semaphore = semaphore.clone();
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| AppError::InternalError(format!("batch semaphore closed: {}", e)))?;
                self.process(request, None).await
            }
        });

        futures::future::join_all(tasks).await
    }

    pub async fn stats(&self) -> ServiceStats {
        ServiceStats {
            cache: self.optimizer.cache_stats(),
            providers: self.manager.provider_stats().await,
            timestamp: Local::now(),
        }
    }
}

/// Reject requests that no provider could serve
pub fn validate(request: &ChatRequest) -> Result<()> {
    if request.messages.is_empty() {
        return Err(AppError::InvalidRequest("messages cannot be empty".to_string()));
    }
    if request.messages.iter().all(|m| m.content.trim().is_empty()) {
        return Err(AppError::InvalidRequest("prompt cannot be empty".to_string()));
    }

    let prompt_chars: usize = request.messages.iter().map(|m| m.content.chars().count()).sum();
    if prompt_chars > MAX_PROMPT_CHARS {
        return Err(AppError::InvalidRequest(format!(
            "prompt too long ({} characters, max {})",
            prompt_chars, MAX_PROMPT_CHARS
        )));
    }

    let params = &request.params;
    if params.max_tokens == 0 || params.max_tokens > MAX_TOKENS_LIMIT {
        return Err(AppError::InvalidRequest(format!(
            "max_tokens must be between 1 and {}",
            MAX_TOKENS_LIMIT
        )));
    }
    if !(0.0..=2.0).contains(&params.temperature) {
        return Err(AppError::InvalidRequest(
            "temperature must be between 0.0 and 2.0".to_string(),
        ));
    }
    if let Some(top_p) = params.top_p {
        if !(top_p > 0.0 && top_p <= 1.0) {
            return Err(AppError::InvalidRequest("top_p must be in (0, 1]".to_string()));
        }
    }

    Ok(())
}
