use crate::pricing::{ModelKind, ModelPricing, ModelTier, PricingTable};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;

/// Keeps inverse-price terms finite for free models
const PRICE_EPSILON: f64 = 0.001;

/// Quality floor applied to complex tasks under the quality-first strategy
const COMPLEX_TASK_QUALITY_FLOOR: f64 = 0.9;

const LAST_RESORT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    Low,
    #[default]
    Medium,
    High,
    Aggressive,
}

impl OptimizationLevel {
    pub fn strategy(&self) -> SelectionStrategy {
        match self {
            Self::Low => SelectionStrategy::QualityFirst,
            Self::Medium => SelectionStrategy::Balanced,
            Self::High => SelectionStrategy::CostFirst,
            Self::Aggressive => SelectionStrategy::Cheapest,
        }
    }
}

impl fmt::Display for OptimizationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

impl FromStr for OptimizationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(format!("unknown optimization level: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SelectionStrategy {
    QualityFirst,
    CostFirst,
    Cheapest,
    Balanced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskComplexity {
    Simple,
    #[default]
    Medium,
    Complex,
}

impl FromStr for TaskComplexity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "medium" => Ok(Self::Medium),
            "complex" => Ok(Self::Complex),
            other => Err(format!("unknown task complexity: {}", other)),
        }
    }
}

/// Inputs to a model selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionCriteria {
    pub service_type: String,
    pub task_complexity: TaskComplexity,
    /// Minimum acceptable quality in [0, 1]
    pub quality_requirement: f64,
    /// Weight given to price over quality in [0, 1]
    pub cost_sensitivity: f64,
}

impl Default for SelectionCriteria {
    fn default() -> Self {
        Self {
            service_type: "llm".to_string(),
            task_complexity: TaskComplexity::Medium,
            quality_requirement: 0.8,
            cost_sensitivity: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelChoice {
    pub model_name: String,
    pub tier: ModelTier,
}

impl From<&ModelPricing> for ModelChoice {
    fn from(pricing: &ModelPricing) -> Self {
        Self {
            model_name: pricing.model_name.clone(),
            tier: pricing.tier,
        }
    }
}

/// Picks a model from the pricing table according to the optimization level
#[derive(Debug, Clone)]
pub struct ModelSelector {
    pricing: Arc<PricingTable>,
    level: OptimizationLevel,
    model_switching: bool,
    default_tier: ModelTier,
    fallback_tier: ModelTier,
}

impl ModelSelector {
    pub fn new(pricing: Arc<PricingTable>, level: OptimizationLevel) -> Self {
        Self {
            pricing,
            level,
            model_switching: true,
            default_tier: ModelTier::Standard,
            fallback_tier: ModelTier::Basic,
        }
    }

    /// Pin selection to `default_tier` when switching is disabled
    pub fn with_model_switching(mut self, enabled: bool, default_tier: ModelTier) -> Self {
        self.model_switching = enabled;
        self.default_tier = default_tier;
        self
    }

    pub fn with_fallback_tier(mut self, tier: ModelTier) -> Self {
        self.fallback_tier = tier;
        self
    }

    pub fn level(&self) -> OptimizationLevel {
        self.level
    }

    pub fn select(&self, criteria: &SelectionCriteria) -> ModelChoice {
        let candidates = self.candidates(&criteria.service_type);

        let picked = if self.model_switching {
            match self.level.strategy() {
                SelectionStrategy::QualityFirst => quality_first(&candidates, criteria),
                SelectionStrategy::CostFirst => cost_first(&candidates, criteria.cost_sensitivity),
                SelectionStrategy::Cheapest => cheapest(candidates.iter().copied()),
                SelectionStrategy::Balanced => balanced(&candidates),
            }
        } else {
            cheapest(candidates.iter().copied().filter(|m| m.tier == self.default_tier))
        };

        let choice = match picked {
            Some(model) => ModelChoice::from(model),
            None => self.fallback(&candidates),
        };

        debug!(
            service = %criteria.service_type,
            level = %self.level,
            model = %choice.model_name,
            tier = %choice.tier,
            "Model selected"
        );

        choice
    }

    /// Models whose kind matches the service; iteration order is alphabetical
    fn candidates(&self, service_type: &str) -> Vec<&ModelPricing> {
        let kind = if service_type.eq_ignore_ascii_case("embedding") {
            ModelKind::Embedding
        } else {
            ModelKind::Chat
        };
        self.pricing.iter_kind(kind).collect()
    }

    fn fallback(&self, candidates: &[&ModelPricing]) -> ModelChoice {
        cheapest(candidates.iter().copied().filter(|m| m.tier == self.fallback_tier))
            .or_else(|| cheapest(candidates.iter().copied()))
            .map(ModelChoice::from)
            .unwrap_or_else(|| ModelChoice {
                model_name: LAST_RESORT_MODEL.to_string(),
                tier: ModelTier::Basic,
            })
    }
}

fn inverse_price(model: &ModelPricing) -> f64 {
    1.0 / (model.total_price_per_1k() + PRICE_EPSILON)
}

/// Highest scoring model; equal scores keep the alphabetically first name
fn max_by_score<'a>(
    candidates: impl Iterator<Item = &'a ModelPricing>,
    score: impl Fn(&ModelPricing) -> f64,
) -> Option<&'a ModelPricing> {
    candidates.fold(None, |best, model| match best {
        Some(current) if score(model).partial_cmp(&score(current)) != Some(Ordering::Greater) => {
            Some(current)
        }
        _ => Some(model),
    })
}

fn cheapest<'a>(candidates: impl Iterator<Item = &'a ModelPricing>) -> Option<&'a ModelPricing> {
    max_by_score(candidates, |m| -m.total_price_per_1k())
}

fn quality_first<'a>(
    candidates: &[&'a ModelPricing],
    criteria: &SelectionCriteria,
) -> Option<&'a ModelPricing> {
    let mut floor = criteria.quality_requirement;
    if criteria.task_complexity == TaskComplexity::Complex {
        floor = floor.max(COMPLEX_TASK_QUALITY_FLOOR);
    }

    for tier in ModelTier::DESCENDING {
        if tier.score() < floor {
            break;
        }
        if let Some(model) = cheapest(candidates.iter().copied().filter(|m| m.tier == tier)) {
            return Some(model);
        }
    }
    None
}

fn cost_first<'a>(candidates: &[&'a ModelPricing], cost_sensitivity: f64) -> Option<&'a ModelPricing> {
    let weight = cost_sensitivity.clamp(0.0, 1.0);
    max_by_score(candidates.iter().copied(), |m| {
        weight * inverse_price(m) + (1.0 - weight) * m.tier.score()
    })
}

fn balanced<'a>(candidates: &[&'a ModelPricing]) -> Option<&'a ModelPricing> {
    max_by_score(candidates.iter().copied(), |m| {
        0.5 * m.tier.score() + 0.5 * inverse_price(m)
    })
}
