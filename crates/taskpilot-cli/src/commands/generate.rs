//! `taskpilot generate`

use super::report_usage;
use taskpilot_core::{AiServices, ServiceParams};

pub async fn run(ai: &AiServices, params: ServiceParams, json: bool) -> anyhow::Result<()> {
    let out = ai.generate_text(params).await?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "text": out.main_result,
                "telemetry": out.telemetry_data,
            }))?
        );
        return Ok(());
    }

    println!("{}", out.main_result);
    report_usage(out.telemetry_data.as_ref());
    Ok(())
}
