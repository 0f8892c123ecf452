//! `taskpilot object`

use super::report_usage;
use anyhow::Context;
use serde_json::Value;
use std::path::Path;
use taskpilot_core::{AiServices, ServiceParams};

/// Read a schema file and check it compiles.
pub fn load_schema(path: &Path) -> anyhow::Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read schema file '{}'", path.display()))?;
    let schema: Value = serde_json::from_str(&raw)
        .with_context(|| format!("invalid schema JSON in '{}'", path.display()))?;
    jsonschema::validator_for(&schema)
        .map_err(|e| anyhow::anyhow!("invalid JSON schema in '{}': {e}", path.display()))?;
    Ok(schema)
}

pub async fn run(
    ai: &AiServices,
    params: ServiceParams,
    schema_path: &Path,
    name: Option<String>,
) -> anyhow::Result<()> {
    let mut params = params.schema(load_schema(schema_path)?);
    if let Some(name) = name {
        params = params.object_name(name);
    }

    let out = ai.generate_object(params).await?;
    println!("{}", serde_json::to_string_pretty(&out.main_result)?);
    report_usage(out.telemetry_data.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("task.json");
        std::fs::write(&path, r#"{"type": "object", "required": ["title"]}"#).unwrap();
        assert_eq!(load_schema(&path).unwrap()["required"][0], "title");
    }

    #[test]
    fn test_load_schema_rejects_bad_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"type": 12}"#).unwrap();
        let err = load_schema(&path).unwrap_err();
        assert!(err.to_string().contains("invalid JSON schema"));

        let missing = dir.path().join("missing.json");
        assert!(load_schema(&missing).is_err());
    }
}
