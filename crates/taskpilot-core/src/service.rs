//! Unified service runner: role → adapter → retry → result + telemetry.

use crate::config::{find_project_root, ConfigStore, RoleConfig};
use crate::credentials::{resolve_credential, Session};
use crate::error::ServiceError;
use crate::error_message::extract_error_message;
use crate::retry::{attempt_with_retries, is_retryable, RetryPolicy};
use crate::role::{role_config, role_parameters, Role};
use crate::telemetry::{
    record_usage, OutputType, PricingRecorder, UsageInput, UsageRecord, UsageRecorder,
};
use once_cell::sync::OnceCell;
use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use taskpilot_provider::{
    mentions_unsupported_tools, Message, ObjectSpec, ProviderAdapter, ProviderError,
    ProviderRegistry, ProviderRequest, ServiceType, TextStream, Usage,
};
use tracing::{debug, error, info};

/// Tool name used when the caller does not name the object.
pub const DEFAULT_OBJECT_NAME: &str = "generated_object";

/// Everything a caller passes for one AI call.
#[derive(Debug, Clone)]
pub struct ServiceParams {
    pub role: Role,
    pub command_name: String,
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub schema: Option<Value>,
    pub object_name: Option<String>,
    pub output_type: OutputType,
    pub session: Option<Session>,
    pub project_root: Option<PathBuf>,
    pub max_retries: Option<u32>,
}

impl ServiceParams {
    pub fn new(role: Role, command_name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            role,
            command_name: command_name.into(),
            prompt: prompt.into(),
            system_prompt: None,
            schema: None,
            object_name: None,
            output_type: OutputType::Cli,
            session: None,
            project_root: None,
            max_retries: None,
        }
    }

    pub fn system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = Some(schema);
        self
    }

    pub fn object_name(mut self, name: impl Into<String>) -> Self {
        self.object_name = Some(name.into());
        self
    }

    pub fn output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    pub fn session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }
}

/// Service-specific payload.
#[derive(Debug)]
pub enum MainResult {
    Text(String),
    Object(Value),
    Stream(TextStream),
}

/// Result of a successful call.
///
/// `telemetry_data` is `None` when recording failed, the backend reported no
/// usage, or the result is a stream. Streams carry `pending_telemetry`
/// instead, filled in once the stream is drained.
#[derive(Debug)]
pub struct ServiceOutput<T = MainResult> {
    pub main_result: T,
    pub telemetry_data: Option<UsageRecord>,
    pub pending_telemetry: Option<PendingTelemetry>,
}

impl<T> ServiceOutput<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ServiceOutput<U> {
        ServiceOutput {
            main_result: f(self.main_result),
            telemetry_data: self.telemetry_data,
            pending_telemetry: self.pending_telemetry,
        }
    }
}

/// Usage record of a stream, set when the stream ends.
#[derive(Debug, Clone, Default)]
pub struct PendingTelemetry(Arc<OnceCell<UsageRecord>>);

impl PendingTelemetry {
    /// `None` until the stream is drained, and also when recording failed.
    pub fn get(&self) -> Option<UsageRecord> {
        self.0.get().cloned()
    }

    fn fill(&self, record: UsageRecord) {
        let _ = self.0.set(record);
    }
}

/// A call ready to hit the provider.
struct PreparedCall {
    role: Role,
    role_config: RoleConfig,
    adapter: Arc<dyn ProviderAdapter>,
    request: ProviderRequest,
    policy: RetryPolicy,
    usage_input: UsageInput,
}

impl PreparedCall {
    fn label(&self) -> String {
        format!(
            "{}/{}/{}",
            self.role, self.role_config.provider, self.role_config.model_id
        )
    }

    fn usage_for(&self, usage: Usage) -> UsageInput {
        UsageInput {
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            ..self.usage_input.clone()
        }
    }
}

/// Drives one AI call per `run`.
///
/// Holds only shared read-only state, so one runner serves concurrent calls
/// for any number of projects.
pub struct ServiceRunner {
    registry: Arc<ProviderRegistry>,
    recorder: Arc<dyn UsageRecorder>,
    retry: RetryPolicy,
}

impl ServiceRunner {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            registry,
            recorder: Arc::new(PricingRecorder::default()),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn UsageRecorder>) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Run `service` and return its payload plus the usage record.
    pub async fn run(
        &self,
        service: ServiceType,
        params: ServiceParams,
    ) -> Result<ServiceOutput, ServiceError> {
        match service {
            ServiceType::GenerateText => Ok(self.run_text(params).await?.map(MainResult::Text)),
            ServiceType::StreamText => Ok(self.run_stream(params).await?.map(MainResult::Stream)),
            ServiceType::GenerateObject => {
                Ok(self.run_object(params).await?.map(MainResult::Object))
            }
        }
    }

    pub async fn run_text(
        &self,
        params: ServiceParams,
    ) -> Result<ServiceOutput<String>, ServiceError> {
        let call = self.prepare(ServiceType::GenerateText, &params).await?;
        let adapter = call.adapter.clone();
        let request = call.request.clone();

        let result = attempt_with_retries(&call.policy, &call.label(), || {
            let adapter = adapter.clone();
            let request = request.clone();
            async move { adapter.generate_text(request).await }
        })
        .await
        .map_err(|e| provider_failure(ServiceType::GenerateText, &call, e))?;

        info!(label = %call.label(), chars = result.text.len(), "Text generation complete");
        let telemetry_data = self.record(&call, result.usage);
        Ok(ServiceOutput {
            main_result: result.text,
            telemetry_data,
            pending_telemetry: None,
        })
    }

    pub async fn run_object(
        &self,
        params: ServiceParams,
    ) -> Result<ServiceOutput<Value>, ServiceError> {
        let call = self.prepare(ServiceType::GenerateObject, &params).await?;
        let adapter = call.adapter.clone();
        let request = call.request.clone();

        let result = attempt_with_retries(&call.policy, &call.label(), || {
            let adapter = adapter.clone();
            let request = request.clone();
            async move { adapter.generate_object(request).await }
        })
        .await
        .map_err(|e| provider_failure(ServiceType::GenerateObject, &call, e))?;

        info!(label = %call.label(), "Object generation complete");
        let telemetry_data = self.record(&call, result.usage);
        Ok(ServiceOutput {
            main_result: result.object,
            telemetry_data,
            pending_telemetry: None,
        })
    }

    /// Start a stream. Usage is recorded when the caller drains it.
    pub async fn run_stream(
        &self,
        params: ServiceParams,
    ) -> Result<ServiceOutput<TextStream>, ServiceError> {
        let call = self.prepare(ServiceType::StreamText, &params).await?;
        let adapter = call.adapter.clone();
        let request = call.request.clone();

        let stream = attempt_with_retries(&call.policy, &call.label(), || {
            let adapter = adapter.clone();
            let request = request.clone();
            async move { adapter.stream_text(request).await }
        })
        .await
        .map_err(|e| provider_failure(ServiceType::StreamText, &call, e))?;

        let recorder = self.recorder.clone();
        let base_input = call.usage_input.clone();
        let pending = PendingTelemetry::default();
        let slot = pending.clone();
        let stream = stream.on_complete(Box::new(move |usage| {
            if let Some(usage) = usage {
                let input = UsageInput {
                    input_tokens: usage.input_tokens,
                    output_tokens: usage.output_tokens,
                    ..base_input
                };
                if let Some(record) = record_usage(recorder.as_ref(), &input) {
                    slot.fill(record);
                }
            }
        }));

        debug!(label = %call.label(), "Stream started");
        Ok(ServiceOutput {
            main_result: stream,
            telemetry_data: None,
            pending_telemetry: Some(pending),
        })
    }

    fn record(&self, call: &PreparedCall, usage: Option<Usage>) -> Option<UsageRecord> {
        let usage = usage?;
        record_usage(self.recorder.as_ref(), &call.usage_for(usage))
    }

    /// Validate input, resolve configuration and build the request.
    ///
    /// Nothing here touches the network. Config and `.env` reads run on the
    /// blocking pool.
    async fn prepare(
        &self,
        service: ServiceType,
        params: &ServiceParams,
    ) -> Result<PreparedCall, ServiceError> {
        if params.prompt.trim().is_empty() {
            return Err(ServiceError::Validation(format!(
                "A prompt is required for {service}"
            )));
        }
        let object = match service {
            ServiceType::GenerateObject => Some(object_spec(params)?),
            _ => None,
        };

        let registry = self.registry.clone();
        let retry = self.retry;
        let params = params.clone();
        tokio::task::spawn_blocking(move || {
            resolve_call(&registry, retry, service, &params, object)
        })
        .await
        .map_err(|e| ServiceError::Io(io::Error::other(e)))?
    }
}

/// Load the project configuration for `params` and build the call.
fn resolve_call(
    registry: &ProviderRegistry,
    retry: RetryPolicy,
    service: ServiceType,
    params: &ServiceParams,
    object: Option<ObjectSpec>,
) -> Result<PreparedCall, ServiceError> {
    let root = match &params.project_root {
        Some(root) => root.clone(),
        None => find_project_root(&std::env::current_dir()?),
    };
    let config = ConfigStore::for_project(&root).load()?;
    let role = params.role;
    let role_config = role_config(&config, role)?;

    let adapter = registry
        .get(&role_config.provider)
        .ok_or_else(|| ServiceError::UnknownProvider {
            role,
            provider: role_config.provider.clone(),
        })?;
    if !adapter.supports(service) {
        return Err(match service {
            ServiceType::GenerateObject => ServiceError::Capability {
                role,
                provider: role_config.provider.clone(),
                model: role_config.model_id.clone(),
                detail: format!("{} does not implement tool calling", adapter.name()),
            },
            _ => ServiceError::UnsupportedService {
                provider: role_config.provider.clone(),
                service,
            },
        });
    }

    let api_key = resolve_credential(adapter.as_ref(), params.session.as_ref(), &root);
    if adapter.requires_api_key() && api_key.is_none() {
        return Err(ServiceError::CredentialMissing {
            provider: role_config.provider.clone(),
            env_var: adapter.api_key_env_var().to_string(),
        });
    }

    let mut messages = Vec::with_capacity(2);
    if let Some(system) = params.system_prompt.as_ref().filter(|s| !s.trim().is_empty()) {
        messages.push(Message::system(system.clone()));
    }
    messages.push(Message::user(params.prompt.clone()));

    let model_info = adapter.model_info(&role_config.model_id);
    let parameters = role_parameters(&role_config, model_info.as_ref());

    let request = ProviderRequest {
        api_key,
        model_id: role_config.model_id.clone(),
        messages,
        max_tokens: parameters.max_tokens,
        temperature: parameters.temperature,
        base_url: config.base_url_for(&role_config),
        object,
    };
    debug!(%service, role = %role, request = ?request, "Built provider request");

    let policy = match params.max_retries {
        Some(max_retries) => retry.with_max_retries(max_retries),
        None => retry,
    };

    let usage_input = UsageInput {
        user_id: config.global.user_id.clone(),
        command_name: params.command_name.clone(),
        provider: role_config.provider.clone(),
        model_id: role_config.model_id.clone(),
        input_tokens: 0,
        output_tokens: 0,
        output_type: params.output_type,
    };

    Ok(PreparedCall {
        role,
        role_config,
        adapter,
        request,
        policy,
        usage_input,
    })
}

fn object_spec(params: &ServiceParams) -> Result<ObjectSpec, ServiceError> {
    let schema = params.schema.clone().ok_or_else(|| {
        ServiceError::Validation("A schema is required for generateObject".to_string())
    })?;
    if !schema.is_object() {
        return Err(ServiceError::Validation("Schema must be a JSON object".to_string()));
    }
    let name = params
        .object_name
        .clone()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_OBJECT_NAME.to_string());
    Ok(ObjectSpec { schema, name })
}

/// Turn a provider failure into a single error with call context.
fn provider_failure(
    service: ServiceType,
    call: &PreparedCall,
    source: ProviderError,
) -> ServiceError {
    let message = extract_error_message(&source);
    let role = call.role;
    let provider = call.role_config.provider.clone();
    let model = call.role_config.model_id.clone();
    error!(%service, role = %role, %provider, %model, error = %message, "AI service call failed");

    let unsupported = matches!(source, ProviderError::UnsupportedCapability { .. })
        || mentions_unsupported_tools(&message);
    if service == ServiceType::GenerateObject && unsupported {
        return ServiceError::Capability {
            role,
            provider,
            model,
            detail: message,
        };
    }

    if is_retryable(&source) {
        ServiceError::ProviderTransient {
            role,
            provider,
            model,
            message,
            source,
        }
    } else {
        ServiceError::ProviderFatal {
            role,
            provider,
            model,
            message,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testing::{mock_project, mock_session, FailingRecorder, MockAdapter, Reply};
    use futures::StreamExt;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn runner(adapter: Arc<MockAdapter>) -> ServiceRunner {
        let mut registry = ProviderRegistry::new();
        registry.register(adapter);
        ServiceRunner::new(Arc::new(registry))
            .with_retry_policy(RetryPolicy::default().with_base_delay(Duration::from_millis(1)))
    }

    fn params(dir: &TempDir) -> ServiceParams {
        ServiceParams::new(Role::Main, "add-task", "Write a task title")
            .project_root(dir.path())
            .session(mock_session())
    }

    fn rate_limited() -> ProviderError {
        ProviderError::from_response(
            429,
            json!({"error": {"message": "Rate limit exceeded"}}).to_string(),
        )
    }

    #[tokio::test]
    async fn test_text_passthrough_with_telemetry() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::new(Reply::Text("Set up CI")));
        let out = runner(adapter.clone())
            .run(ServiceType::GenerateText, params(&dir).system_prompt("You plan tasks."))
            .await
            .unwrap();

        assert!(matches!(out.main_result, MainResult::Text(ref t) if t == "Set up CI"));
        let record = out.telemetry_data.unwrap();
        assert_eq!(record.command_name, "add-task");
        assert_eq!(record.user_id, "user-42");
        assert_eq!(record.provider, "mock");
        assert_eq!(record.total_tokens, 15);
        assert_eq!(record.total_cost, 0.0);

        let request = adapter.last_request().unwrap();
        assert_eq!(request.messages.len(), 2);
        assert_eq!(request.api_key.as_deref(), Some("test-key"));
        // Capped to the mock model's 1000-token limit.
        assert_eq!(request.max_tokens, Some(1000));
        assert_eq!(request.temperature, Some(0.3));
        assert!(request.object.is_none());
    }

    #[tokio::test]
    async fn test_missing_prompt_is_validation_without_config() {
        let dir = TempDir::new().unwrap();
        let adapter = Arc::new(MockAdapter::new(Reply::Text("unused")));
        let err = runner(adapter.clone())
            .run(
                ServiceType::GenerateText,
                ServiceParams::new(Role::Main, "add-task", "  ").project_root(dir.path()),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_config_makes_no_calls() {
        let dir = TempDir::new().unwrap();
        let adapter = Arc::new(MockAdapter::new(Reply::Text("unused")));
        let err = runner(adapter.clone())
            .run(ServiceType::GenerateText, params(&dir))
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::ConfigurationMissing { .. }));
        assert!(err.to_string().contains("models --setup"));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_unconfigured_role() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::new(Reply::Text("unused")));
        let mut p = params(&dir);
        p.role = Role::Fallback;
        let err = runner(adapter.clone())
            .run(ServiceType::GenerateText, p)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::RoleNotConfigured { role: Role::Fallback, .. }));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_missing_credential_fails_before_call() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::new(Reply::Text("unused")));
        let err = runner(adapter.clone())
            .run(
                ServiceType::GenerateText,
                ServiceParams::new(Role::Main, "add-task", "hi").project_root(dir.path()),
            )
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("API key missing for provider mock"));
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_provider() {
        let dir = mock_project();
        let runner = ServiceRunner::new(Arc::new(ProviderRegistry::new()));
        let err = runner
            .run(ServiceType::GenerateText, params(&dir))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::UnknownProvider { ref provider, .. } if provider == "mock"));
    }

    #[tokio::test]
    async fn test_transient_failure_exhausts_retries() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::failing(rate_limited));
        let err = runner(adapter.clone())
            .run(ServiceType::GenerateText, params(&dir))
            .await
            .unwrap_err();

        assert_eq!(adapter.calls(), 3);
        assert_eq!(err.kind(), ErrorKind::ProviderTransient);
        assert!(err.to_string().contains("Rate limit exceeded"));
        assert!(matches!(
            err.provider_error(),
            Some(ProviderError::Api { status: 429, .. })
        ));
    }

    #[tokio::test]
    async fn test_max_retries_override() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::failing(rate_limited));
        let _ = runner(adapter.clone())
            .run(ServiceType::GenerateText, params(&dir).max_retries(0))
            .await;
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_fatal_failure_runs_once() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::failing(|| {
            ProviderError::from_response(
                400,
                json!({"error": {"message": "prompt is too long"}}).to_string(),
            )
        }));
        let err = runner(adapter.clone())
            .run(ServiceType::GenerateText, params(&dir))
            .await
            .unwrap_err();

        assert_eq!(adapter.calls(), 1);
        assert_eq!(err.kind(), ErrorKind::ProviderFatal);
        assert_eq!(
            err.to_string(),
            "main role (mock/mock-model) failed: prompt is too long"
        );
    }

    #[tokio::test]
    async fn test_object_request_and_result() {
        let dir = mock_project();
        let object = json!({"title": "Write docs", "priority": "high"});
        let adapter = Arc::new(MockAdapter::new(Reply::Object(object.clone())));
        let schema = json!({"type": "object", "properties": {"title": {"type": "string"}}});

        let out = runner(adapter.clone())
            .run(
                ServiceType::GenerateObject,
                params(&dir).schema(schema.clone()).object_name("new_task"),
            )
            .await
            .unwrap();

        assert!(matches!(out.main_result, MainResult::Object(ref v) if *v == object));
        assert!(out.telemetry_data.is_some());
        let spec = adapter.last_request().unwrap().object.unwrap();
        assert_eq!(spec.name, "new_task");
        assert_eq!(spec.schema, schema);
    }

    #[tokio::test]
    async fn test_object_requires_schema() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::new(Reply::Object(json!({}))));
        let err = runner(adapter.clone())
            .run(ServiceType::GenerateObject, params(&dir))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = runner(adapter.clone())
            .run(ServiceType::GenerateObject, params(&dir).schema(json!("string")))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(adapter.calls(), 0);
    }

    #[tokio::test]
    async fn test_capability_mismatch_names_model_and_role() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::failing(|| {
            ProviderError::from_response(
                404,
                json!({"error": {"message": "No endpoints found that support tool use"}})
                    .to_string(),
            )
        }));
        let mut p = params(&dir).schema(json!({"type": "object"}));
        p.role = Role::Research;
        let err = runner(adapter.clone())
            .run(ServiceType::GenerateObject, p)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProviderCapability);
        let msg = err.to_string();
        assert!(msg.contains("'mock-research'"));
        assert!(msg.contains("'research' role"));
        assert_eq!(adapter.calls(), 1);
    }

    #[tokio::test]
    async fn test_telemetry_failure_keeps_result() {
        let dir = mock_project();
        let adapter = Arc::new(MockAdapter::new(Reply::Text("ok")));
        let out = runner(adapter)
            .with_recorder(Arc::new(FailingRecorder))
            .run(ServiceType::GenerateText, params(&dir))
            .await
            .unwrap();

        assert!(matches!(out.main_result, MainResult::Text(ref t) if t == "ok"));
        assert!(out.telemetry_data.is_none());
    }

    #[tokio::test]
    async fn test_stream_records_usage_when_drained() {
        use crate::telemetry::TelemetryError;
        use std::sync::Mutex;

        #[derive(Default)]
        struct Capture(Mutex<Vec<UsageInput>>);

        impl UsageRecorder for Capture {
            fn record(&self, input: &UsageInput) -> Result<UsageRecord, TelemetryError> {
                self.0.lock().unwrap().push(input.clone());
                PricingRecorder::default().record(input)
            }
        }

        let dir = mock_project();
        let capture = Arc::new(Capture::default());
        let adapter = Arc::new(MockAdapter::new(Reply::Text("Hello")));
        let out = runner(adapter)
            .with_recorder(capture.clone())
            .run_stream(params(&dir))
            .await
            .unwrap();

        assert!(out.telemetry_data.is_none());
        let pending = out.pending_telemetry.unwrap();
        let mut stream = out.main_result;
        assert!(capture.0.lock().unwrap().is_empty());
        assert!(pending.get().is_none());

        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk.unwrap());
        }
        assert_eq!(text, "Hello");

        let recorded = capture.0.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].input_tokens, 10);
        assert_eq!(recorded[0].output_tokens, 5);

        let record = pending.get().unwrap();
        assert_eq!(record.total_tokens, 15);
        assert_eq!(record.command_name, "add-task");
    }
}
