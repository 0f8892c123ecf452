//! Per-call credential lookup.

use std::collections::HashMap;
use std::path::Path;
use taskpilot_provider::ProviderAdapter;
use tracing::{debug, warn};

/// Caller-scoped environment, e.g. variables forwarded by an MCP client.
///
/// Values here take precedence over the process environment.
#[derive(Clone, Default)]
pub struct Session {
    pub env: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.env.keys().collect();
        names.sort();
        f.debug_struct("Session").field("env", &names).finish()
    }
}

/// Empty strings and template placeholders count as unset.
fn usable(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.contains("KEY_HERE")
}

fn from_dotenv(project_root: &Path, name: &str) -> Option<String> {
    let path = project_root.join(".env");
    let iter = dotenvy::from_path_iter(&path).ok()?;
    iter.filter_map(Result::ok)
        .find(|(key, value)| key == name && usable(value))
        .map(|(_, value)| value)
}

/// Find the credential for `adapter`.
///
/// Checks the session, then the process environment, then `<project_root>/.env`.
/// Returns `None` for providers that need no key, and also when a required
/// key is absent; the caller decides whether that is fatal.
pub fn resolve_credential(
    adapter: &dyn ProviderAdapter,
    session: Option<&Session>,
    project_root: &Path,
) -> Option<String> {
    if !adapter.requires_api_key() {
        return None;
    }
    let name = adapter.api_key_env_var();

    if let Some(value) = session
        .and_then(|s| s.env.get(name))
        .filter(|v| usable(v))
    {
        debug!(provider = adapter.name(), source = "session", "Resolved credential");
        return Some(value.clone());
    }

    if let Some(value) = std::env::var(name).ok().filter(|v| usable(v)) {
        debug!(provider = adapter.name(), source = "env", "Resolved credential");
        return Some(value);
    }

    if let Some(value) = from_dotenv(project_root, name) {
        debug!(provider = adapter.name(), source = ".env", "Resolved credential");
        return Some(value);
    }

    warn!(
        provider = adapter.name(),
        env_var = name,
        "API key not found in session, environment or project .env"
    );
    None
}
