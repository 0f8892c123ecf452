//! Error types for the taskpilot-core crate.

use crate::role::Role;
use std::path::PathBuf;
use taskpilot_provider::{ProviderError, ServiceType};

/// Coarse classification of a [`ServiceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or incomplete configuration. Never retried.
    Configuration,
    /// Required credential absent. Never retried.
    Credential,
    /// Bad input caught before any network call.
    Validation,
    /// Transient provider failure that survived every retry.
    ProviderTransient,
    /// Model or backend lacks a required capability.
    ProviderCapability,
    /// Any other provider rejection.
    ProviderFatal,
}

/// Error returned by the AI service layer.
///
/// Provider failures carry a flattened, human-readable message plus the
/// original [`ProviderError`] as their source.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(
        "Configuration file not found at {}. Run `taskpilot models --setup` to create it.",
        .path.display()
    )]
    ConfigurationMissing { path: PathBuf },

    #[error("Invalid configuration at {}: {message}", .path.display())]
    InvalidConfig { path: PathBuf, message: String },

    #[error(
        "No {missing} configured for the '{role}' role. \
         Run `taskpilot models --set-{role} <provider> <model>` to assign one."
    )]
    RoleNotConfigured { role: Role, missing: &'static str },

    #[error("Unknown provider '{provider}' configured for the '{role}' role")]
    UnknownProvider { role: Role, provider: String },

    #[error("Provider '{provider}' does not support {service}")]
    UnsupportedService {
        provider: String,
        service: ServiceType,
    },

    #[error(
        "API key missing for provider {provider}. \
         Set {env_var} in your environment or the project .env file."
    )]
    CredentialMissing { provider: String, env_var: String },

    #[error("{0}")]
    Validation(String),

    #[error(
        "Model '{model}' ({provider}) assigned to the '{role}' role does not support \
         structured output (tool use), which this command requires. Assign a model with \
         tool-use support: `taskpilot models --set-{role} <provider> <model>`."
    )]
    Capability {
        role: Role,
        provider: String,
        model: String,
        detail: String,
    },

    #[error("{role} role ({provider}/{model}) failed after retries: {message}")]
    ProviderTransient {
        role: Role,
        provider: String,
        model: String,
        message: String,
        #[source]
        source: ProviderError,
    },

    #[error("{role} role ({provider}/{model}) failed: {message}")]
    ProviderFatal {
        role: Role,
        provider: String,
        model: String,
        message: String,
        #[source]
        source: ProviderError,
    },

    /// I/O error while saving configuration
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Taxonomy bucket for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigurationMissing { .. }
            | Self::InvalidConfig { .. }
            | Self::RoleNotConfigured { .. }
            | Self::UnknownProvider { .. }
            | Self::UnsupportedService { .. }
            | Self::Io(_) => ErrorKind::Configuration,
            Self::CredentialMissing { .. } => ErrorKind::Credential,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Capability { .. } => ErrorKind::ProviderCapability,
            Self::ProviderTransient { .. } => ErrorKind::ProviderTransient,
            Self::ProviderFatal { .. } => ErrorKind::ProviderFatal,
        }
    }

    /// The provider error behind a provider failure, if any.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::ProviderTransient { source, .. } | Self::ProviderFatal { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}
