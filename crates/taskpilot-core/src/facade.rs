//! Public entry points for AI calls.

use crate::error::ServiceError;
use crate::retry::RetryPolicy;
use crate::service::{ServiceOutput, ServiceParams, ServiceRunner, DEFAULT_OBJECT_NAME};
use crate::telemetry::UsageRecorder;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use taskpilot_provider::{ProviderRegistry, TextStream};

/// Retries for structured output, which fails transiently more often.
const OBJECT_MAX_RETRIES: u32 = 3;

/// Provider-agnostic AI services for task commands.
///
/// ```no_run
/// # async fn demo() -> Result<(), taskpilot_core::ServiceError> {
/// use taskpilot_core::{AiServices, Role, ServiceParams};
///
/// let ai = AiServices::with_defaults();
/// let out = ai
///     .generate_text(ServiceParams::new(Role::Main, "add-task", "Name this task"))
///     .await?;
/// println!("{}", out.main_result);
/// # Ok(())
/// # }
/// ```
pub struct AiServices {
    runner: ServiceRunner,
}

impl AiServices {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self::from_runner(ServiceRunner::new(registry))
    }

    /// Services backed by every built-in provider.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(ProviderRegistry::with_defaults()))
    }

    pub fn from_runner(runner: ServiceRunner) -> Self {
        Self { runner }
    }

    pub fn with_recorder(self, recorder: Arc<dyn UsageRecorder>) -> Self {
        Self::from_runner(self.runner.with_recorder(recorder))
    }

    pub fn with_retry_policy(self, retry: RetryPolicy) -> Self {
        Self::from_runner(self.runner.with_retry_policy(retry))
    }

    pub fn runner(&self) -> &ServiceRunner {
        &self.runner
    }

    pub async fn generate_text(
        &self,
        params: ServiceParams,
    ) -> Result<ServiceOutput<String>, ServiceError> {
        self.runner.run_text(params).await
    }

    pub async fn stream_text(
        &self,
        params: ServiceParams,
    ) -> Result<ServiceOutput<TextStream>, ServiceError> {
        self.runner.run_stream(params).await
    }

    /// Generate a JSON object matching `params.schema`.
    ///
    /// Defaults the object name to `generated_object` and retries to 3.
    pub async fn generate_object(
        &self,
        mut params: ServiceParams,
    ) -> Result<ServiceOutput<Value>, ServiceError> {
        if params.object_name.is_none() {
            params.object_name = Some(DEFAULT_OBJECT_NAME.to_string());
        }
        if params.max_retries.is_none() {
            params.max_retries = Some(OBJECT_MAX_RETRIES);
        }
        self.runner.run_object(params).await
    }

    /// Generate an object of type `T`, deriving the schema from the type.
    pub async fn generate_object_as<T>(
        &self,
        params: ServiceParams,
    ) -> Result<ServiceOutput<T>, ServiceError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| {
            ServiceError::Validation(format!("Could not build schema for {}: {e}", T::schema_name()))
        })?;
        let out = self.generate_object(params.schema(schema)).await?;

        let object = serde_json::from_value(out.main_result).map_err(|e| {
            ServiceError::Validation(format!(
                "Generated object does not match {}: {e}",
                T::schema_name()
            ))
        })?;
        Ok(ServiceOutput {
            main_result: object,
            telemetry_data: out.telemetry_data,
            pending_telemetry: None,
        })
    }
}
