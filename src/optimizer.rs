//! Cost tracking, budget alerts and optimization advice.
//!
//! [`CostOptimizer`] is constructed once at startup and shared by handle; it
//! owns the pricing table, the model selector, the response cache, the budget
//! manager and a bounded history of cost records.

use crate::budget::{BudgetManager, BudgetStatus};
use crate::cache::{CacheStats, RequestCache};
use crate::config::{CacheConfig, OptimizerConfig};
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::ChatResponse;
use crate::pricing::{ModelTier, PricingTable};
use crate::selector::{ModelChoice, ModelSelector, SelectionCriteria};
use chrono::{DateTime, Duration as ChronoDuration, Local};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt::Write as _;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Share of the daily budget spent in the last 24h that triggers advice
const DAILY_SPEND_ADVICE_RATIO: f64 = 0.9;
/// Average per-request cost above which premium model usage is flagged
const EXPENSIVE_REQUEST_USD: f64 = 0.10;
const LOW_CACHE_HIT_RATE: f64 = 0.3;
/// Lookups needed before the hit rate is meaningful
const MIN_CACHE_LOOKUPS: u64 = 10;

/// One priced unit of work; never mutated after creation
#[derive(Debug, Clone, Serialize)]
pub struct CostRecord {
    pub timestamp: DateTime<Local>,
    pub service_type: String,
    pub model_name: String,
    pub tier: ModelTier,
    pub tokens_used: u64,
    pub request_count: u32,
    pub cost_usd: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    CostOptimization,
    ModelOptimization,
    CacheOptimization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub description: String,
    /// Estimated saving in USD
    pub potential_savings: f64,
    pub confidence: f64,
    pub implementation_effort: Level,
    pub priority: Level,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ModelUsage {
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CostSummary {
    pub total_cost: f64,
    pub total_tokens: u64,
    pub total_requests: u64,
    pub service_breakdown: BTreeMap<String, f64>,
    pub model_breakdown: BTreeMap<String, ModelUsage>,
    pub budget_status: BudgetStatus,
    pub cache_stats: Option<CacheStats>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(AppError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    summary: CostSummary,
    recommendations: Vec<Recommendation>,
    detailed_records: &'a VecDeque<CostRecord>,
}

pub struct CostOptimizer {
    config: OptimizerConfig,
    pricing: Arc<PricingTable>,
    selector: ModelSelector,
    cache: RequestCache<ChatResponse>,
    budget: BudgetManager,
    history: Mutex<VecDeque<CostRecord>>,
}

impl CostOptimizer {
    pub fn new(config: OptimizerConfig, cache_config: &CacheConfig, pricing: Arc<PricingTable>) -> Self {
        let selector = ModelSelector::new(pricing.clone(), config.optimization_level)
            .with_model_switching(config.enable_model_switching, config.default_model_tier)
            .with_fallback_tier(config.fallback_model_tier);
        let budget = BudgetManager::new(
            config.daily_budget_usd,
            config.monthly_budget_usd,
            config.budget_alert_threshold,
        );
        let cache = RequestCache::new(cache_config.max_size, Duration::from_secs(cache_config.ttl_seconds));
        let history = Mutex::new(VecDeque::with_capacity(config.history_capacity.min(1024)));

        Self {
            config,
            pricing,
            selector,
            cache,
            budget,
            history,
        }
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Price and record usage; returns the cost, or 0 when tracking is disabled
    pub fn record_cost(
        &self,
        service_type: &str,
        model_name: &str,
        input_tokens: u64,
        output_tokens: u64,
        request_count: u32,
        metadata: Option<serde_json::Value>,
    ) -> f64 {
        self.record_cost_at(
            service_type,
            model_name,
            input_tokens,
            output_tokens,
            request_count,
            metadata,
            Local::now(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn record_cost_at(
        &self,
        service_type: &str,
        model_name: &str,
        input_tokens: u64,
        output_tokens: u64,
        request_count: u32,
        metadata: Option<serde_json::Value>,
        now: DateTime<Local>,
    ) -> f64 {
        if !self.config.cost_tracking_enabled {
            return 0.0;
        }

        let pricing = self.pricing.get_or_default(model_name);
        let cost = pricing.calculate_cost(input_tokens, output_tokens, request_count);

        let record = CostRecord {
            timestamp: now,
            service_type: service_type.to_string(),
            model_name: model_name.to_string(),
            tier: pricing.tier,
            tokens_used: input_tokens + output_tokens,
            request_count,
            cost_usd: cost,
            metadata,
        };

        self.push_record(record, now);
        metrics::record_cost(service_type, model_name, cost);

        if !self.budget.record_cost_at(cost, now.naive_local()) {
            metrics::record_budget_alert();
            warn!(
                service = %service_type,
                model = %model_name,
                cost_usd = cost,
                "Budget alert threshold exceeded"
            );
        }

        debug!(service = %service_type, model = %model_name, cost_usd = cost, "Cost recorded");
        cost
    }

    fn push_record(&self, record: CostRecord, now: DateTime<Local>) {
        // A retention window reaching past chrono's range keeps everything
        let cutoff = ChronoDuration::try_days(i64::from(self.config.cost_retention_days))
            .and_then(|retention| now.checked_sub_signed(retention));
        let mut history = self.lock_history();

        if let Some(cutoff) = cutoff {
            while history.front().is_some_and(|r| r.timestamp < cutoff) {
                history.pop_front();
            }
        }
        if history.len() >= self.config.history_capacity {
            history.pop_front();
        }
        history.push_back(record);
    }

    pub fn select_model(&self, criteria: &SelectionCriteria) -> ModelChoice {
        self.selector.select(criteria)
    }

    pub fn get_cached_response(&self, key: &str) -> Option<ChatResponse> {
        if !self.config.enable_request_caching {
            return None;
        }
        let hit = self.cache.get(key);
        metrics::record_cache_event(if hit.is_some() { "hit" } else { "miss" });
        hit
    }

    pub fn cache_response(&self, key: &str, response: ChatResponse) {
        if self.config.enable_request_caching {
            self.cache.set(key, response);
        }
    }

    pub fn budget_status(&self) -> BudgetStatus {
        self.budget.status()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn records(&self) -> Vec<CostRecord> {
        self.lock_history().iter().cloned().collect()
    }

    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.recommendations_at(Local::now())
    }

    fn recommendations_at(&self, now: DateTime<Local>) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();
        {
            let history = self.lock_history();
            if !history.is_empty() {
                recommendations.extend(self.analyze_recent_spend(&history, now));
            }
            recommendations.extend(self.analyze_model_usage(&history));
        }

        if self.config.enable_request_caching {
            recommendations.extend(self.analyze_cache());
        }
        recommendations
    }

    fn analyze_recent_spend(&self, history: &VecDeque<CostRecord>, now: DateTime<Local>) -> Option<Recommendation> {
        let since = now - ChronoDuration::hours(24);
        let recent: f64 = history
            .iter()
            .filter(|r| r.timestamp >= since)
            .map(|r| r.cost_usd)
            .sum();

        (recent > self.budget.daily_limit() * DAILY_SPEND_ADVICE_RATIO).then(|| Recommendation {
            kind: RecommendationKind::CostOptimization,
            description: "Daily spending is approaching budget limit. Consider switching to lower-tier models."
                .to_string(),
            potential_savings: recent * 0.3,
            confidence: 0.8,
            implementation_effort: Level::Low,
            priority: Level::High,
        })
    }

    fn analyze_model_usage(&self, history: &VecDeque<CostRecord>) -> Vec<Recommendation> {
        let usage = model_breakdown(history);

        usage
            .iter()
            .filter(|(model, _)| {
                self.pricing
                    .get(model)
                    .is_some_and(|p| matches!(p.tier, ModelTier::Premium | ModelTier::Ultra))
            })
            .filter(|(_, u)| u.cost / u.requests.max(1) as f64 > EXPENSIVE_REQUEST_USD)
            .map(|(model, u)| Recommendation {
                kind: RecommendationKind::ModelOptimization,
                description: format!(
                    "High-cost model {} usage detected. Consider switching to {} tier for non-critical tasks.",
                    model, self.config.default_model_tier
                ),
                potential_savings: u.cost * 0.4,
                confidence: 0.7,
                implementation_effort: Level::Medium,
                priority: Level::Medium,
            })
            .collect()
    }

    fn analyze_cache(&self) -> Option<Recommendation> {
        let stats = self.cache.stats();
        (stats.lookups() >= MIN_CACHE_LOOKUPS && stats.hit_rate < LOW_CACHE_HIT_RATE).then(|| Recommendation {
            kind: RecommendationKind::CacheOptimization,
            description: "Low cache hit rate detected. Consider increasing cache size or TTL.".to_string(),
            potential_savings: 0.0,
            confidence: 0.6,
            implementation_effort: Level::Low,
            priority: Level::Medium,
        })
    }

    pub fn summary(&self) -> CostSummary {
        let budget_status = self.budget.status();
        let mut summary = {
            let history = self.lock_history();

            let mut service_breakdown = BTreeMap::new();
            for record in history.iter() {
                *service_breakdown.entry(record.service_type.clone()).or_insert(0.0) += record.cost_usd;
            }

            CostSummary {
                total_cost: history.iter().map(|r| r.cost_usd).sum(),
                total_tokens: history.iter().map(|r| r.tokens_used).sum(),
                total_requests: history.iter().map(|r| u64::from(r.request_count)).sum(),
                service_breakdown,
                model_breakdown: model_breakdown(&history),
                budget_status,
                cache_stats: None,
            }
        };

        summary.cache_stats = self.config.enable_request_caching.then(|| self.cache.stats());
        summary
    }

    /// Summary, recommendations and records as JSON, or the records alone as CSV
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => {
                let summary = self.summary();
                let recommendations = self.recommendations();
                let history = self.lock_history();
                let document = ExportDocument {
                    summary,
                    recommendations,
                    detailed_records: &history,
                };
                Ok(serde_json::to_string_pretty(&document)?)
            }
            ExportFormat::Csv => {
                let mut out =
                    String::from("timestamp,service_type,model_name,model_tier,tokens_used,requests_count,cost_usd\n");
                for r in self.lock_history().iter() {
                    // Writing into a String cannot fail
                    let _ = writeln!(
                        out,
                        "{},{},{},{},{},{},{}",
                        r.timestamp.to_rfc3339(),
                        csv_field(&r.service_type),
                        csv_field(&r.model_name),
                        r.tier,
                        r.tokens_used,
                        r.request_count,
                        r.cost_usd
                    );
                }
                Ok(out)
            }
        }
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, VecDeque<CostRecord>> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn model_breakdown(history: &VecDeque<CostRecord>) -> BTreeMap<String, ModelUsage> {
    let mut usage: BTreeMap<String, ModelUsage> = BTreeMap::new();
    for record in history {
        let entry = usage.entry(record.model_name.clone()).or_default();
        entry.cost += record.cost_usd;
        entry.tokens += record.tokens_used;
        entry.requests += u64::from(record.request_count);
    }
    usage
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
