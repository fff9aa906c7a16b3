// SPDX-License-Identifier: Apache-2.0

//! Token and cost accounting for two-step chat replies.
//!
//! A reply carries usage for the table-selection pass and the
//! SQL-generation pass separately. Costs follow the completion pricing
//! the service is billed at; "adjusted tokens" express everything in
//! uncached-input-token equivalents so a single number can be shown per
//! message.

use serde::Serialize;

use crate::backend::types::{PassUsage, TokenUsage};

pub const CACHED_INPUT_USD_PER_MTOK: f64 = 0.50;
pub const UNCACHED_INPUT_USD_PER_MTOK: f64 = 2.00;
pub const OUTPUT_USD_PER_MTOK: f64 = 8.00;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub cached: f64,
    pub uncached: f64,
    pub output: f64,
    pub total: f64,
}

/// Dollar cost of one pass
pub fn pass_cost(usage: &PassUsage) -> CostBreakdown {
    let cached = usage.cached_tokens() as f64 * CACHED_INPUT_USD_PER_MTOK / 1_000_000.0;
    let uncached = usage.uncached_tokens() as f64 * UNCACHED_INPUT_USD_PER_MTOK / 1_000_000.0;
    let output = usage.completion_tokens as f64 * OUTPUT_USD_PER_MTOK / 1_000_000.0;
    CostBreakdown {
        cached,
        uncached,
        output,
        total: cached + uncached + output,
    }
}

/// All tokens of one pass converted to uncached-input equivalents by cost
/// ratio: cached input counts 0.25×, output counts 4×.
pub fn adjusted_tokens(usage: &PassUsage) -> f64 {
    let cached_ratio = CACHED_INPUT_USD_PER_MTOK / UNCACHED_INPUT_USD_PER_MTOK;
    let output_ratio = OUTPUT_USD_PER_MTOK / UNCACHED_INPUT_USD_PER_MTOK;
    usage.cached_tokens() as f64 * cached_ratio
        + usage.uncached_tokens() as f64
        + usage.completion_tokens as f64 * output_ratio
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub raw_tokens: u64,
    pub adjusted_tokens: f64,
    pub cost: f64,
}

/// Combined figures for both passes of a reply
pub fn summarize(usage: &TokenUsage) -> UsageSummary {
    let passes = [usage.table_pass.as_ref(), usage.sql_pass.as_ref()];
    let mut summary = UsageSummary::default();
    for pass in passes.into_iter().flatten() {
        summary.raw_tokens += pass.total_tokens();
        summary.adjusted_tokens += adjusted_tokens(pass);
        summary.cost += pass_cost(pass).total;
    }
    summary
}

/// High-precision display form, e.g. `$0.000135`
pub fn format_cost(cost: f64) -> String {
    if cost < 0.000001 {
        return "$0.000000".to_string();
    }
    format!("${:.6}", cost)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::PromptTokensDetails;

    fn pass(prompt: u64, cached: u64, completion: u64) -> PassUsage {
        PassUsage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            prompt_tokens_details: Some(PromptTokensDetails {
                cached_tokens: cached,
            }),
        }
    }

    #[test]
    fn cost_per_million_matches_the_price_table() {
        let cached_only = pass(1_000_000, 1_000_000, 0);
        assert!((pass_cost(&cached_only).total - 0.50).abs() < 1e-9);

        let uncached_only = pass(1_000_000, 0, 0);
        assert!((pass_cost(&uncached_only).total - 2.00).abs() < 1e-9);

        let output_only = pass(0, 0, 1_000_000);
        assert!((pass_cost(&output_only).total - 8.00).abs() < 1e-9);
    }

    #[test]
    fn adjusted_tokens_use_cost_ratios() {
        // 1000 cached → 250, 1000 uncached → 1000, 1000 output → 4000
        let usage = pass(2_000, 1_000, 1_000);
        assert!((adjusted_tokens(&usage) - (250.0 + 1_000.0 + 4_000.0)).abs() < 1e-9);
    }

    #[test]
    fn summary_combines_both_passes() {
        let usage = TokenUsage {
            table_pass: Some(pass(1_000, 600, 50)),
            sql_pass: Some(pass(500, 0, 100)),
        };
        let summary = summarize(&usage);
        assert_eq!(summary.raw_tokens, 1_000 + 50 + 500 + 100);
        let expected_adjusted =
            600.0 * 0.25 + 400.0 + 50.0 * 4.0 + 500.0 + 100.0 * 4.0;
        assert!((summary.adjusted_tokens - expected_adjusted).abs() < 1e-9);
        assert!(summary.cost > 0.0);
    }

    #[test]
    fn missing_passes_sum_to_zero() {
        let summary = summarize(&TokenUsage::default());
        assert_eq!(summary.raw_tokens, 0);
        assert_eq!(summary.cost, 0.0);
    }

    #[test]
    fn cost_formatting() {
        assert_eq!(format_cost(0.0), "$0.000000");
        assert_eq!(format_cost(0.0001355), "$0.000136");
        assert_eq!(format_cost(1.5), "$1.500000");
    }
}
