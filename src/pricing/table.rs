use crate::pricing::models::{ModelKind, ModelPricing, ModelTier};
use std::collections::BTreeMap;

/// Pricing used for models missing from the table
const UNKNOWN_MODEL_INPUT_PER_1K: f64 = 0.001;
const UNKNOWN_MODEL_OUTPUT_PER_1K: f64 = 0.002;

/// Immutable per-model pricing data, ordered by model name
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: BTreeMap<String, ModelPricing>,
}

impl PricingTable {
    pub fn from_records(records: impl IntoIterator<Item = ModelPricing>) -> Self {
        let models = records
            .into_iter()
            .map(|record| (record.model_name.clone(), record))
            .collect();
        Self { models }
    }

    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.models.get(model)
    }

    /// Table entry, or standard-tier default pricing for unknown models
    pub fn get_or_default(&self, model: &str) -> ModelPricing {
        self.models.get(model).cloned().unwrap_or_else(|| {
            ModelPricing::chat(
                model,
                ModelTier::Standard,
                UNKNOWN_MODEL_INPUT_PER_1K,
                UNKNOWN_MODEL_OUTPUT_PER_1K,
                4096,
                4096,
            )
        })
    }

    /// All records in alphabetical order of model name
    pub fn iter(&self) -> impl Iterator<Item = &ModelPricing> {
        self.models.values()
    }

    pub fn iter_kind(&self, kind: ModelKind) -> impl Iterator<Item = &ModelPricing> {
        self.models.values().filter(move |m| m.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        use ModelTier::*;

        Self::from_records([
            // OpenAI
            ModelPricing::chat("gpt-4", Premium, 0.03, 0.06, 8192, 8192),
            ModelPricing::chat("gpt-4-turbo", Premium, 0.01, 0.03, 4096, 128_000),
            ModelPricing::chat("gpt-3.5-turbo", Standard, 0.0015, 0.002, 4096, 16_385),
            ModelPricing::chat("gpt-3.5-turbo-16k", Standard, 0.003, 0.004, 4096, 16_385),
            // Anthropic
            ModelPricing::chat("claude-3-opus-20240229", Ultra, 0.015, 0.075, 4096, 200_000),
            ModelPricing::chat("claude-3-sonnet-20240229", Premium, 0.003, 0.015, 4096, 200_000),
            ModelPricing::chat("claude-3-haiku-20240307", Standard, 0.00025, 0.00125, 4096, 200_000),
            // DeepSeek
            ModelPricing::chat("deepseek-chat", Basic, 0.00027, 0.0011, 8192, 64_000),
            ModelPricing::chat("deepseek-reasoner", Standard, 0.00055, 0.00219, 8192, 64_000),
            // Embeddings
            ModelPricing::embedding("text-embedding-ada-002", Standard, 0.0001, 8191),
            ModelPricing::embedding("text-embedding-3-small", Basic, 0.00002, 8191),
            ModelPricing::embedding("text-embedding-3-large", Standard, 0.00013, 8191),
        ])
    }
}
