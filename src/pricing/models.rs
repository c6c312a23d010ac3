use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse quality/cost bucket for a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Basic,
    Standard,
    Premium,
    Ultra,
}

impl ModelTier {
    /// Tiers from highest to lowest
    pub const DESCENDING: [ModelTier; 4] = [Self::Ultra, Self::Premium, Self::Standard, Self::Basic];

    /// Quality score used by the selection strategies
    pub fn score(&self) -> f64 {
        match self {
            Self::Basic => 0.6,
            Self::Standard => 0.8,
            Self::Premium => 0.9,
            Self::Ultra => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::Premium => "premium",
            Self::Ultra => "ultra",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "standard" => Ok(Self::Standard),
            "premium" => Ok(Self::Premium),
            "ultra" => Ok(Self::Ultra),
            other => Err(format!("unknown model tier: {}", other)),
        }
    }
}

/// What a model is used for; selection only considers models of the matching kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Chat,
    Embedding,
}

/// Model pricing information (prices in USD per 1K tokens)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model_name: String,
    pub tier: ModelTier,
    pub kind: ModelKind,
    pub input_price_per_1k: f64,
    pub output_price_per_1k: f64,
    pub flat_request_fee: f64,
    pub max_tokens: u32,
    pub context_window: u32,
}

impl ModelPricing {
    pub fn chat(
        model_name: &str,
        tier: ModelTier,
        input_price_per_1k: f64,
        output_price_per_1k: f64,
        max_tokens: u32,
        context_window: u32,
    ) -> Self {
        Self {
            model_name: model_name.to_string(),
            tier,
            kind: ModelKind::Chat,
            input_price_per_1k,
            output_price_per_1k,
            flat_request_fee: 0.0,
            max_tokens,
            context_window,
        }
    }

    pub fn embedding(model_name: &str, tier: ModelTier, input_price_per_1k: f64, context_window: u32) -> Self {
        Self {
            model_name: model_name.to_string(),
            tier,
            kind: ModelKind::Embedding,
            input_price_per_1k,
            output_price_per_1k: 0.0,
            flat_request_fee: 0.0,
            max_tokens: context_window,
            context_window,
        }
    }

    /// Combined input + output price per 1K tokens
    pub fn total_price_per_1k(&self) -> f64 {
        self.input_price_per_1k + self.output_price_per_1k
    }

    /// Cost of `requests` calls consuming the given token counts
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64, requests: u32) -> f64 {
        let token_cost = (input_tokens as f64 / 1000.0) * self.input_price_per_1k
            + (output_tokens as f64 / 1000.0) * self.output_price_per_1k;
        token_cost + f64::from(requests) * self.flat_request_fee
    }
}
