//! JSON Schema handling shared by every adapter.

use crate::error::ProviderError;
use serde_json::{Map, Value};

/// Keywords many backends reject in tool parameter schemas.
pub const UNSUPPORTED_KEYWORDS: &[&str] = &["$schema", "$id", "exclusiveMinimum", "exclusiveMaximum"];

/// Keywords whose object values are maps of names to subschemas.
const SCHEMA_MAP_KEYWORDS: &[&str] = &[
    "properties",
    "patternProperties",
    "definitions",
    "$defs",
    "dependentSchemas",
];

/// Strip unsupported keywords from a schema tree.
///
/// Keys inside `properties` and similar maps are property names, not
/// keywords, and are kept even when they collide with a stripped keyword.
pub fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(sanitize_object(map)),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

fn sanitize_object(map: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        if UNSUPPORTED_KEYWORDS.contains(&key.as_str()) {
            continue;
        }
        let cleaned = match value {
            Value::Object(named) if SCHEMA_MAP_KEYWORDS.contains(&key.as_str()) => Value::Object(
                named
                    .iter()
                    .map(|(name, sub)| (name.clone(), sanitize_schema(sub)))
                    .collect(),
            ),
            other => sanitize_schema(other),
        };
        out.insert(key.clone(), cleaned);
    }
    out
}

/// Validate a generated object against the caller's schema.
pub fn validate_object(schema: &Value, object: &Value) -> Result<(), ProviderError> {
    let validator = jsonschema::validator_for(schema)
        .map_err(|e| ProviderError::InvalidObject(format!("invalid JSON schema: {e}")))?;

    let mut errors = validator
        .iter_errors(object)
        .map(|e| e.to_string())
        .collect::<Vec<_>>();
    if errors.is_empty() {
        Ok(())
    } else {
        errors.sort();
        Err(ProviderError::InvalidObject(format!(
            "object does not match schema: {}",
            errors.join("; ")
        )))
    }
}
