use crate::manager::ProviderStats;
use rand::seq::SliceRandom;
use rand::Rng;

/// Weight given to a provider that has not served any request yet
const UNTRIED_WEIGHT: f64 = 1.0;
const SUCCESS_RATE_FACTOR: f64 = 0.6;
const LATENCY_FACTOR: f64 = 0.4;

/// Selection weight: `0.6 * success_rate + 0.4 * (1000 / avg_response_ms)`
pub fn provider_weight(stats: &ProviderStats) -> f64 {
    if stats.total_requests == 0 {
        return UNTRIED_WEIGHT;
    }

    // No latency samples yet: only the success rate counts
    let latency_score = if stats.successful_requests == 0 || stats.average_response_time_ms <= 0.0 {
        0.0
    } else {
        1000.0 / stats.average_response_time_ms.max(1.0)
    };
    SUCCESS_RATE_FACTOR * stats.success_rate() + LATENCY_FACTOR * latency_score
}

/// Pick a candidate with probability proportional to its weight.
/// Falls back to a uniform pick when every weight is zero.
pub fn select_by_weight<'a, R: Rng>(candidates: &'a [(String, f64)], rng: &mut R) -> Option<&'a str> {
    if candidates.is_empty() {
        return None;
    }

    let total_weight: f64 = candidates
        .iter()
        .map(|(_, weight)| sanitize(*weight))
        .sum();

    if total_weight <= 0.0 {
        return candidates.choose(rng).map(|(name, _)| name.as_str());
    }

    let mut random_weight = rng.gen_range(0.0..total_weight);

    for (name, weight) in candidates {
        let weight = sanitize(*weight);
        if random_weight < weight {
            return Some(name.as_str());
        }
        random_weight -= weight;
    }

    // Rounding can leave a sliver past the last bucket
    candidates
        .iter()
        .rev()
        .find(|(_, weight)| sanitize(*weight) > 0.0)
        .map(|(name, _)| name.as_str())
}

fn sanitize(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        0.0
    }
}
