//! Usage records and token-based cost.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Where the result of a call is shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Cli,
    Mcp,
}

impl fmt::Display for OutputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cli => f.write_str("cli"),
            Self::Mcp => f.write_str("mcp"),
        }
    }
}

/// Pricing per 1M tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub currency: &'static str,
}

impl ModelPricing {
    pub const fn usd(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
            currency: "USD",
        }
    }
}

/// Static `(provider, model)` price list.
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    entries: HashMap<(String, String), ModelPricing>,
}

static BUILTIN_PRICING: Lazy<PricingTable> = Lazy::new(|| {
    PricingTable::new([
        // Anthropic
        ("anthropic", "claude-opus-4-20250514", ModelPricing::usd(15.0, 75.0)),
        ("anthropic", "claude-sonnet-4-20250514", ModelPricing::usd(3.0, 15.0)),
        ("anthropic", "claude-3-7-sonnet-20250219", ModelPricing::usd(3.0, 15.0)),
        ("anthropic", "claude-3-5-haiku-20241022", ModelPricing::usd(0.80, 4.0)),
        // OpenAI
        ("openai", "gpt-4o", ModelPricing::usd(2.50, 10.0)),
        ("openai", "gpt-4o-2024-05-13", ModelPricing::usd(5.0, 15.0)),
        ("openai", "gpt-4o-mini", ModelPricing::usd(0.15, 0.60)),
        ("openai", "gpt-4.1", ModelPricing::usd(2.0, 8.0)),
        ("openai", "o3", ModelPricing::usd(2.0, 8.0)),
        ("openai", "o4-mini", ModelPricing::usd(1.10, 4.40)),
        // Perplexity
        ("perplexity", "sonar-pro", ModelPricing::usd(3.0, 15.0)),
        ("perplexity", "sonar", ModelPricing::usd(1.0, 1.0)),
        ("perplexity", "sonar-reasoning-pro", ModelPricing::usd(2.0, 8.0)),
        ("perplexity", "sonar-deep-research", ModelPricing::usd(2.0, 8.0)),
        // xAI
        ("xai", "grok-3", ModelPricing::usd(3.0, 15.0)),
        ("xai", "grok-3-mini", ModelPricing::usd(0.30, 0.50)),
    ])
});

impl PricingTable {
    pub fn new<'a>(entries: impl IntoIterator<Item = (&'a str, &'a str, ModelPricing)>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(provider, model, price)| {
                ((provider.to_lowercase(), model.to_string()), price)
            })
            .collect();
        Self { entries }
    }

    /// Prices shipped with the crate.
    pub fn builtin() -> &'static PricingTable {
        &BUILTIN_PRICING
    }

    pub fn get(&self, provider: &str, model_id: &str) -> Option<&ModelPricing> {
        self.entries.get(&(provider.to_lowercase(), model_id.to_string()))
    }

    /// Cost of one call, rounded to 6 decimals. Unlisted models cost zero.
    pub fn compute_cost(
        &self,
        provider: &str,
        model_id: &str,
        input_tokens: u64,
        output_tokens: u64,
    ) -> (f64, &'static str) {
        match self.get(provider, model_id) {
            Some(pricing) => {
                let input_cost = (input_tokens as f64 / 1_000_000.0) * pricing.input_per_million;
                let output_cost =
                    (output_tokens as f64 / 1_000_000.0) * pricing.output_per_million;
                (round6(input_cost + output_cost), pricing.currency)
            }
            None => (0.0, "USD"),
        }
    }
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// One successful AI call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecord {
    pub timestamp: DateTime<Utc>,
    pub user_id: String,
    pub command_name: String,
    pub provider: String,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub currency: String,
    pub output_type: OutputType,
}

/// What the runner knows about a finished call.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageInput {
    pub user_id: String,
    pub command_name: String,
    pub provider: String,
    pub model_id: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub output_type: OutputType,
}

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("usage record is missing {0}")]
    MissingField(&'static str),

    #[error("usage recording failed: {0}")]
    Failed(String),
}

/// Turns call usage into a [`UsageRecord`].
pub trait UsageRecorder: Send + Sync {
    fn record(&self, input: &UsageInput) -> Result<UsageRecord, TelemetryError>;
}

/// Records usage priced from a [`PricingTable`].
#[derive(Debug, Clone)]
pub struct PricingRecorder {
    table: Arc<PricingTable>,
}

impl PricingRecorder {
    pub fn new(table: PricingTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }
}

impl Default for PricingRecorder {
    fn default() -> Self {
        Self::new(PricingTable::builtin().clone())
    }
}

impl UsageRecorder for PricingRecorder {
    fn record(&self, input: &UsageInput) -> Result<UsageRecord, TelemetryError> {
        if input.command_name.trim().is_empty() {
            return Err(TelemetryError::MissingField("commandName"));
        }
        if input.provider.is_empty() {
            return Err(TelemetryError::MissingField("provider"));
        }
        if input.model_id.is_empty() {
            return Err(TelemetryError::MissingField("modelId"));
        }

        let (total_cost, currency) = self.table.compute_cost(
            &input.provider,
            &input.model_id,
            input.input_tokens,
            input.output_tokens,
        );

        Ok(UsageRecord {
            timestamp: Utc::now(),
            user_id: input.user_id.clone(),
            command_name: input.command_name.clone(),
            provider: input.provider.clone(),
            model_id: input.model_id.clone(),
            input_tokens: input.input_tokens,
            output_tokens: input.output_tokens,
            total_tokens: input.input_tokens + input.output_tokens,
            total_cost,
            currency: currency.to_string(),
            output_type: input.output_type,
        })
    }
}

/// Record usage, logging instead of failing.
pub fn record_usage(recorder: &dyn UsageRecorder, input: &UsageInput) -> Option<UsageRecord> {
    match recorder.record(input) {
        Ok(record) => {
            info!(
                command = %record.command_name,
                provider = %record.provider,
                model = %record.model_id,
                input_tokens = record.input_tokens,
                output_tokens = record.output_tokens,
                cost = record.total_cost,
                "Recorded AI usage"
            );
            Some(record)
        }
        Err(e) => {
            warn!(command = %input.command_name, error = %e, "Failed to record AI usage");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(provider: &str, model: &str, input_tokens: u64, output_tokens: u64) -> UsageInput {
        UsageInput {
            user_id: "1234567890".to_string(),
            command_name: "add-task".to_string(),
            provider: provider.to_string(),
            model_id: model.to_string(),
            input_tokens,
            output_tokens,
            output_type: OutputType::Cli,
        }
    }

    #[test]
    fn test_cost_one_million_each() {
        let (cost, currency) = PricingTable::builtin().compute_cost(
            "openai",
            "gpt-4o-2024-05-13",
            1_000_000,
            1_000_000,
        );
        assert_eq!(cost, 20.0);
        assert_eq!(currency, "USD");
    }

    #[test]
    fn test_unlisted_model_is_free() {
        let (cost, _) = PricingTable::builtin().compute_cost("ollama", "llama3.1", 5_000, 900);
        assert_eq!(cost, 0.0);
    }

    #[test]
    fn test_cost_rounds_to_six_decimals() {
        let (cost, _) =
            PricingTable::builtin().compute_cost("anthropic", "claude-3-5-haiku-20241022", 7, 3);
        // 7 * 0.8e-6 + 3 * 4e-6 = 0.0000176
        assert_eq!(cost, 0.000018);
    }

    #[test]
    fn test_record_fills_totals() {
        let record = PricingRecorder::default()
            .record(&input("openai", "gpt-4o", 1200, 300))
            .unwrap();
        assert_eq!(record.total_tokens, 1500);
        assert_eq!(record.output_type, OutputType::Cli);
        assert!(record.total_cost > 0.0);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["commandName"], "add-task");
        assert_eq!(json["outputType"], "cli");
    }

    #[test]
    fn test_custom_table() {
        let recorder = PricingRecorder::new(PricingTable::new([(
            "ollama",
            "llama3.1",
            ModelPricing::usd(1.0, 2.0),
        )]));
        let record = recorder
            .record(&input("Ollama", "llama3.1", 1_000_000, 500_000))
            .unwrap();
        assert_eq!(record.total_cost, 2.0);
    }

    #[test]
    fn test_record_usage_swallows_errors() {
        let mut bad = input("openai", "gpt-4o", 1, 1);
        bad.command_name.clear();
        assert!(record_usage(&PricingRecorder::default(), &bad).is_none());
    }
}
