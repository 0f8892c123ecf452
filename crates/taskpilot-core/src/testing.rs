//! Test doubles shared by the unit tests of this crate.

use crate::credentials::Session;
use crate::telemetry::{TelemetryError, UsageInput, UsageRecord, UsageRecorder};
use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use taskpilot_provider::{
    ModelInfo, ObjectResult, ProviderAdapter, ProviderError, ProviderRequest, StreamEvent,
    TextResult, TextStream, Usage,
};
use tempfile::TempDir;

pub(crate) const MOCK_KEY_VAR: &str = "TASKPILOT_MOCK_API_KEY";

pub(crate) enum Reply {
    Text(&'static str),
    Object(Value),
    Fail(Box<dyn Fn() -> ProviderError + Send + Sync>),
}

pub(crate) struct MockAdapter {
    reply: Reply,
    calls: AtomicUsize,
    last_request: Mutex<Option<ProviderRequest>>,
}

impl MockAdapter {
    pub(crate) fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub(crate) fn failing(make: impl Fn() -> ProviderError + Send + Sync + 'static) -> Self {
        Self::new(Reply::Fail(Box::new(make)))
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn last_request(&self) -> Option<ProviderRequest> {
        self.last_request.lock().unwrap().clone()
    }

    fn begin(&self, request: ProviderRequest) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request);
        match &self.reply {
            Reply::Fail(make) => Err(make()),
            _ => Ok(()),
        }
    }
}

fn usage() -> Option<Usage> {
    Some(Usage {
        input_tokens: 10,
        output_tokens: 5,
    })
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo::new("mock-model", "Mock Model", 1000)]
    }

    fn api_key_env_var(&self) -> &str {
        MOCK_KEY_VAR
    }

    async fn generate_text(&self, request: ProviderRequest) -> Result<TextResult, ProviderError> {
        self.begin(request)?;
        match &self.reply {
            Reply::Text(text) => Ok(TextResult {
                text: text.to_string(),
                usage: usage(),
            }),
            _ => Err(ProviderError::EmptyResponse("no text".to_string())),
        }
    }

    async fn stream_text(&self, request: ProviderRequest) -> Result<TextStream, ProviderError> {
        self.begin(request)?;
        let text = match &self.reply {
            Reply::Text(text) => *text,
            _ => "",
        };
        let (head, tail) = text.split_at(text.len() / 2);
        Ok(TextStream::from_events(vec![
            Ok(StreamEvent::TextDelta {
                delta: head.to_string(),
            }),
            Ok(StreamEvent::TextDelta {
                delta: tail.to_string(),
            }),
            Ok(StreamEvent::Usage {
                input: 10,
                output: 5,
            }),
        ]))
    }

    async fn generate_object(
        &self,
        request: ProviderRequest,
    ) -> Result<ObjectResult, ProviderError> {
        self.begin(request)?;
        match &self.reply {
            Reply::Object(object) => Ok(ObjectResult {
                object: object.clone(),
                usage: usage(),
            }),
            _ => Err(ProviderError::InvalidObject("no tool call".to_string())),
        }
    }
}

/// Recorder that always fails.
pub(crate) struct FailingRecorder;

impl UsageRecorder for FailingRecorder {
    fn record(&self, _input: &UsageInput) -> Result<UsageRecord, TelemetryError> {
        Err(TelemetryError::Failed("store unavailable".to_string()))
    }
}

/// Project directory whose main and research roles use the mock adapter.
pub(crate) fn mock_project() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".taskpilot")).unwrap();
    fs::write(
        dir.path().join(".taskpilot").join("config.json"),
        r#"{
            "models": {
                "main": {"provider": "mock", "modelId": "mock-model", "maxTokens": 64000, "temperature": 0.3},
                "research": {"provider": "mock", "modelId": "mock-research"}
            },
            "global": {"userId": "user-42"}
        }"#,
    )
    .unwrap();
    dir
}

pub(crate) fn mock_session() -> Session {
    Session::new().with_var(MOCK_KEY_VAR, "test-key")
}
