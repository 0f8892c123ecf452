//! taskpilot-core: role resolution, retry, telemetry and the unified AI service layer.

pub mod config;
pub mod credentials;
mod error;
pub mod error_message;
pub mod facade;
pub mod retry;
pub mod role;
pub mod service;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use config::{find_project_root, ConfigStore, GlobalSettings, ProjectConfig, RoleConfig, RoleModels};
pub use credentials::{resolve_credential, Session};
pub use error::{ErrorKind, ServiceError};
pub use error_message::extract_error_message;
pub use facade::AiServices;
pub use retry::{attempt_with_retries, is_retryable, RetryPolicy};
pub use role::{resolve_role_config, role_config, role_parameters, Role, RoleParameters};
pub use service::{
    MainResult, PendingTelemetry, ServiceOutput, ServiceParams, ServiceRunner,
    DEFAULT_OBJECT_NAME,
};
pub use taskpilot_provider::ServiceType;
pub use telemetry::{
    record_usage, ModelPricing, OutputType, PricingRecorder, PricingTable, TelemetryError,
    UsageInput, UsageRecord, UsageRecorder,
};
