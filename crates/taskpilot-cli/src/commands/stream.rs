//! `taskpilot stream`

use super::report_usage;
use futures::StreamExt;
use std::io::Write;
use taskpilot_core::{AiServices, ServiceParams};

pub async fn run(ai: &AiServices, params: ServiceParams) -> anyhow::Result<()> {
    let out = ai.stream_text(params).await?;
    let mut stream = out.main_result;

    let mut stdout = std::io::stdout();
    while let Some(delta) = stream.next().await {
        write!(stdout, "{}", delta?)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;

    let record = out.pending_telemetry.and_then(|pending| pending.get());
    report_usage(record.as_ref());
    Ok(())
}
