//! Roles and role → provider/model resolution.

use crate::config::{ConfigStore, ProjectConfig, RoleConfig};
use crate::error::ServiceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use taskpilot_provider::ModelInfo;

/// Why a call is being made. Each role maps to its own provider and model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Main,
    Research,
    Fallback,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Main, Role::Research, Role::Fallback];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Research => "research",
            Self::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "main" => Ok(Self::Main),
            "research" => Ok(Self::Research),
            "fallback" => Ok(Self::Fallback),
            other => Err(ServiceError::Validation(format!(
                "Invalid role '{other}'. Expected one of: main, research, fallback"
            ))),
        }
    }
}

/// Effective generation parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoleParameters {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Load the project configuration and return the settings for `role`.
///
/// Reads from disk on every call; nothing is cached between projects.
pub fn resolve_role_config(role: Role, project_root: &Path) -> Result<RoleConfig, ServiceError> {
    let config = ConfigStore::for_project(project_root).load()?;
    role_config(&config, role)
}

/// Settings for `role` from an already loaded configuration.
pub fn role_config(config: &ProjectConfig, role: Role) -> Result<RoleConfig, ServiceError> {
    let entry = config
        .models
        .get(role)
        .ok_or(ServiceError::RoleNotConfigured {
            role,
            missing: "provider or model",
        })?;

    if entry.provider.trim().is_empty() {
        return Err(ServiceError::RoleNotConfigured {
            role,
            missing: "provider",
        });
    }
    if entry.model_id.trim().is_empty() {
        return Err(ServiceError::RoleNotConfigured {
            role,
            missing: "model",
        });
    }

    Ok(entry.clone())
}

/// Merge role settings with the model's published limits.
///
/// A configured `max_tokens` above the model's maximum output is capped.
pub fn role_parameters(config: &RoleConfig, model: Option<&ModelInfo>) -> RoleParameters {
    let max_tokens = match (config.max_tokens, model) {
        (Some(requested), Some(info)) => Some(requested.min(info.max_output_tokens)),
        (None, Some(info)) => Some(info.max_output_tokens),
        (requested, None) => requested,
    };

    RoleParameters {
        max_tokens,
        temperature: config.temperature,
    }
}
