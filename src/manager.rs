//! Provider orchestration: lazy initialization, weighted selection and failover.

use crate::error::{AppError, ProviderFailure, Result};
use crate::load_balancer::{provider_weight, select_by_weight};
use crate::metrics;
use crate::models::{ChatRequest, ChatResponse};
use crate::providers::LlmProvider;
use crate::streaming::TextStream;
use chrono::{DateTime, Local};
use dashmap::DashMap;
use futures::stream::StreamExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ProviderStatus {
    #[default]
    Uninitialized,
    Active,
    /// Initialization failed; the provider is never selected
    Error(String),
}

/// Per-provider counters, updated after every attempt
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProviderStats {
    pub status: ProviderStatus,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub total_response_time_ms: u64,
    pub average_response_time_ms: f64,
    pub last_request_time: Option<DateTime<Local>>,
    pub last_error: Option<String>,
    /// Failures of this provider that were retried on another one
    pub failovers: u64,
}

impl ProviderStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            return 0.0;
        }
        self.successful_requests as f64 / self.total_requests as f64
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    pub name: String,
    pub provider_type: String,
    pub stats: ProviderStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub healthy: bool,
    pub success_rate: f64,
    pub last_request_time: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub overall: OverallHealth,
    pub total_providers: usize,
    pub active_providers: usize,
    pub providers: Vec<ProviderHealth>,
    pub timestamp: DateTime<Local>,
}

pub struct ProviderManager {
    providers: Vec<Arc<dyn LlmProvider>>,
    stats: Arc<DashMap<String, ProviderStats>>,
    initialized: tokio::sync::Mutex<bool>,
    rng: Mutex<StdRng>,
}

impl ProviderManager {
    pub fn new(providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        Self::with_rng(providers, StdRng::from_entropy())
    }

    /// Deterministic provider selection, for tests
    pub fn with_seed(providers: Vec<Arc<dyn LlmProvider>>, seed: u64) -> Self {
        Self::with_rng(providers, StdRng::seed_from_u64(seed))
    }

    fn with_rng(providers: Vec<Arc<dyn LlmProvider>>, rng: StdRng) -> Self {
        let stats = DashMap::new();
        for provider in &providers {
            stats.insert(provider.name().to_string(), ProviderStats::default());
        }

        Self {
            providers,
            stats: Arc::new(stats),
            initialized: tokio::sync::Mutex::new(false),
            rng: Mutex::new(rng),
        }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Initialize every provider once. Failures mark the provider as errored
    /// instead of aborting the others.
    pub async fn initialize(&self) {
        let mut initialized = self.initialized.lock().await;
        if *initialized {
            return;
        }

        let results = futures::future::join_all(self.providers.iter().map(|p| p.initialize())).await;

        for (provider, result) in self.providers.iter().zip(results) {
            let status = match result {
                Ok(()) => ProviderStatus::Active,
                Err(e) => {
                    warn!(provider = %provider.name(), error = %e, "Provider initialization failed");
                    ProviderStatus::Error(e.to_string())
                }
            };
            if let Some(mut stats) = self.stats.get_mut(provider.name()) {
                stats.status = status;
            }
        }

        *initialized = true;
        info!(
            total = self.providers.len(),
            active = self.active_count(),
            "Provider manager initialized"
        );
    }

    /// Generate a response, failing over to other providers on retryable errors.
    ///
    /// A request pinned to an available `preferred` provider is never retried elsewhere.
    pub async fn generate(&self, request: &ChatRequest, preferred: Option<&str>) -> Result<ChatResponse> {
        self.initialize().await;

        let pinned = preferred.filter(|name| self.is_active(name));
        let mut excluded = HashSet::new();
        let mut failures = Vec::new();

        let mut failed_over_from: Option<String> = None;

        for attempt in 0..self.providers.len() {
            let Some(provider) = self.select_provider(pinned, &excluded) else {
                break;
            };
            let name = provider.name().to_string();
            if let Some(from) = failed_over_from.take() {
                record_failover(&self.stats, &from, &name);
            }

            debug!(provider = %name, attempt, model = %request.model, "Dispatching request");
            record_start(&self.stats, &name);

            match provider.generate(request).await {
                Ok(response) => {
                    record_success(&self.stats, &name, response.response_time_ms);
                    metrics::record_tokens(&name, &response.model, "input", response.usage.input_tokens);
                    metrics::record_tokens(&name, &response.model, "output", response.usage.output_tokens);
                    return Ok(response);
                }
                Err(e) => {
                    record_failure(&self.stats, &name, &e);
                    warn!(provider = %name, attempt, error = %e, "Provider request failed");

                    if pinned.is_some() || !e.is_retryable() {
                        return Err(e);
                    }

                    failures.push(ProviderFailure {
                        provider: name.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    excluded.insert(name.clone());
                    failed_over_from = Some(name);
                }
            }
        }

        if failures.is_empty() {
            return Err(AppError::NoHealthyProviders(
                "no initialized provider is available".to_string(),
            ));
        }
        Err(AppError::AllProvidersFailed { failures })
    }

    /// Open a streaming response. Failover only happens while opening the
    /// stream; once chunks flow, errors are passed to the caller.
    pub async fn generate_stream(&self, request: &ChatRequest, preferred: Option<&str>) -> Result<TextStream> {
        self.initialize().await;

        let pinned = preferred.filter(|name| self.is_active(name));
        let mut excluded = HashSet::new();
        let mut failures = Vec::new();

        let mut failed_over_from: Option<String> = None;

        for _ in 0..self.providers.len() {
            let Some(provider) = self.select_provider(pinned, &excluded) else {
                break;
            };
            let name = provider.name().to_string();
            if let Some(from) = failed_over_from.take() {
                record_failover(&self.stats, &from, &name);
            }
            record_start(&self.stats, &name);
            let started = Instant::now();

            match provider.generate_stream(request).await {
                Ok(stream) => {
                    return Ok(track_stream(stream, self.stats.clone(), name, started));
                }
                Err(e) => {
                    record_failure(&self.stats, &name, &e);
                    warn!(provider = %name, error = %e, "Failed to open stream");

                    if pinned.is_some() || !e.is_retryable() {
                        return Err(e);
                    }
                    failures.push(ProviderFailure {
                        provider: name.clone(),
                        kind: e.kind(),
                        message: e.to_string(),
                    });
                    excluded.insert(name.clone());
                    failed_over_from = Some(name);
                }
            }
        }

        if failures.is_empty() {
            return Err(AppError::NoHealthyProviders(
                "no initialized provider is available".to_string(),
            ));
        }
        Err(AppError::AllProvidersFailed { failures })
    }

    pub async fn provider_stats(&self) -> Vec<ProviderSnapshot> {
        self.initialize().await;

        self.providers
            .iter()
            .map(|p| ProviderSnapshot {
                name: p.name().to_string(),
                provider_type: p.provider_type().to_string(),
                stats: self.stats_for(p.name()),
            })
            .collect()
    }

    pub async fn health_check(&self) -> HealthReport {
        self.initialize().await;

        let providers: Vec<ProviderHealth> = self
            .providers
            .iter()
            .map(|p| {
                let stats = self.stats_for(p.name());
                let error = match &stats.status {
                    ProviderStatus::Error(reason) => Some(reason.clone()),
                    _ => None,
                };
                ProviderHealth {
                    name: p.name().to_string(),
                    healthy: stats.status == ProviderStatus::Active,
                    success_rate: stats.success_rate(),
                    last_request_time: stats.last_request_time,
                    error,
                }
            })
            .collect();

        let active = providers.iter().filter(|p| p.healthy).count();
        let overall = if active == 0 {
            OverallHealth::Unhealthy
        } else if active < providers.len() {
            OverallHealth::Degraded
        } else {
            OverallHealth::Healthy
        };

        HealthReport {
            overall,
            total_providers: providers.len(),
            active_providers: active,
            providers,
            timestamp: Local::now(),
        }
    }

    fn stats_for(&self, name: &str) -> ProviderStats {
        self.stats.get(name).map(|s| s.clone()).unwrap_or_default()
    }

    fn is_active(&self, name: &str) -> bool {
        self.stats
            .get(name)
            .is_some_and(|s| s.status == ProviderStatus::Active)
    }

    fn active_count(&self) -> usize {
        self.providers.iter().filter(|p| self.is_active(p.name())).count()
    }

    fn select_provider(&self, pinned: Option<&str>, excluded: &HashSet<String>) -> Option<Arc<dyn LlmProvider>> {
        if let Some(name) = pinned {
            if excluded.contains(name) {
                return None;
            }
            return self.providers.iter().find(|p| p.name() == name).cloned();
        }

        let candidates: Vec<(String, f64)> = self
            .providers
            .iter()
            .filter(|p| !excluded.contains(p.name()))
            .filter_map(|p| {
                let stats = self.stats.get(p.name())?;
                (stats.status == ProviderStatus::Active)
                    .then(|| (p.name().to_string(), provider_weight(&stats)))
            })
            .collect();

        let chosen = {
            let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            select_by_weight(&candidates, &mut *rng)?.to_string()
        };

        self.providers.iter().find(|p| p.name() == chosen).cloned()
    }
}

fn record_start(stats: &DashMap<String, ProviderStats>, provider: &str) {
    if let Some(mut s) = stats.get_mut(provider) {
        s.total_requests += 1;
        s.last_request_time = Some(Local::now());
    }
}

fn record_success(stats: &DashMap<String, ProviderStats>, provider: &str, response_time_ms: u64) {
    if let Some(mut s) = stats.get_mut(provider) {
        s.successful_requests += 1;
        if response_time_ms > 0 {
            s.total_response_time_ms += response_time_ms;
            s.average_response_time_ms = s.total_response_time_ms as f64 / s.successful_requests as f64;
        }
    }
    metrics::record_request(provider, "success");
    metrics::record_duration(provider, Duration::from_millis(response_time_ms));
}

fn record_failure(stats: &DashMap<String, ProviderStats>, provider: &str, error: &AppError) {
    if let Some(mut s) = stats.get_mut(provider) {
        s.failed_requests += 1;
        s.last_error = Some(error.to_string());
    }
    metrics::record_request(provider, &error.kind().to_string());
}

fn record_failover(stats: &DashMap<String, ProviderStats>, from: &str, to: &str) {
    if let Some(mut s) = stats.get_mut(from) {
        s.failovers += 1;
    }
    debug!(from = %from, to = %to, "Failing over to another provider");
    metrics::record_failover(from);
}

/// Record stats for a stream when it finishes or fails
fn track_stream(
    inner: TextStream,
    stats: Arc<DashMap<String, ProviderStats>>,
    provider: String,
    started: Instant,
) -> TextStream {
    let stream = futures::stream::unfold(
        (inner, stats, provider, started, false),
        |(mut inner, stats, provider, started, failed)| async move {
            match inner.next().await {
                Some(Ok(chunk)) => Some((Ok(chunk), (inner, stats, provider, started, failed))),
                Some(Err(e)) => {
                    if !failed {
                        record_failure(&stats, &provider, &e);
                    }
                    Some((Err(e), (inner, stats, provider, started, true)))
                }
                None => {
                    if !failed {
                        record_success(&stats, &provider, started.elapsed().as_millis() as u64);
                    }
                    None
                }
            }
        },
    );
    Box::pin(stream)
}
