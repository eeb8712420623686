use crate::config::PricingConfig;
use crate::core::types::Usage;

/// Estimated dollar cost for a completed request, or `None` for adapters
/// with no configured pricing (the worker adapter, or any adapter an
/// operator left unpriced).
pub fn estimate_cost(pricing: Option<&PricingConfig>, usage: &Usage) -> Option<f64> {
    let pricing = pricing?;
    let prompt_cost = (usage.prompt_tokens as f64 / 1000.0) * pricing.prompt_per_1k;
    let completion_cost = (usage.completion_tokens as f64 / 1000.0) * pricing.completion_per_1k;
    Some(prompt_cost + completion_cost)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pricing_means_no_cost() {
        assert_eq!(estimate_cost(None, &Usage::new(100, 50)), None);
    }

    #[test]
    fn cost_scales_with_tokens_per_1k() {
        let pricing = PricingConfig {
            prompt_per_1k: 0.01,
            completion_per_1k: 0.03,
        };
        let cost = estimate_cost(Some(&pricing), &Usage::new(1000, 1000)).unwrap();
        assert!((cost - 0.04).abs() < 1e-9);
    }
}
