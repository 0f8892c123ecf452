//! Command implementations.

pub mod generate;
pub mod models;
pub mod object;
pub mod stream;

use taskpilot_core::UsageRecord;

/// Print a usage summary to stderr, keeping stdout for the result.
pub fn report_usage(record: Option<&UsageRecord>) {
    if let Some(record) = record {
        eprintln!(
            "[usage] {}/{}: {} in / {} out tokens, cost {:.6} {}",
            record.provider,
            record.model_id,
            record.input_tokens,
            record.output_tokens,
            record.total_cost,
            record.currency
        );
    }
}
