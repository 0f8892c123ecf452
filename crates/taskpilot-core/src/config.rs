use crate::error::ServiceError;
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Directory holding the project configuration.
pub const CONFIG_DIR: &str = ".taskpilot";
/// Configuration file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";
/// Pre-directory configuration file, still read when present.
pub const LEGACY_CONFIG_FILE: &str = ".taskpilotconfig";

const DEFAULT_USER_ID: &str = "1234567890";

/// Provider settings for one role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl RoleConfig {
    pub fn new(provider: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model_id: model_id.into(),
            max_tokens: None,
            temperature: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleModels {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main: Option<RoleConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research: Option<RoleConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<RoleConfig>,
}

impl RoleModels {
    pub fn get(&self, role: Role) -> Option<&RoleConfig> {
        match role {
            Role::Main => self.main.as_ref(),
            Role::Research => self.research.as_ref(),
            Role::Fallback => self.fallback.as_ref(),
        }
    }

    pub fn set(&mut self, role: Role, config: RoleConfig) {
        let slot = match role {
            Role::Main => &mut self.main,
            Role::Research => &mut self.research,
            Role::Fallback => &mut self.fallback,
        };
        *slot = Some(config);
    }
}

/// Project-wide settings. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalSettings {
    pub log_level: String,
    pub debug: bool,
    pub default_subtasks: u32,
    pub default_priority: String,
    pub project_name: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ollama_base_url: Option<String>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            default_subtasks: 5,
            default_priority: "medium".to_string(),
            project_name: "Taskpilot".to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            ollama_base_url: None,
        }
    }
}

/// Serialized settings from `<project>/.taskpilot/config.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub models: RoleModels,
    pub global: GlobalSettings,
}

impl ProjectConfig {
    /// Settings written by `taskpilot models --setup`.
    pub fn default_config() -> Self {
        let mut models = RoleModels::default();
        models.set(
            Role::Main,
            RoleConfig {
                max_tokens: Some(64_000),
                temperature: Some(0.2),
                ..RoleConfig::new("anthropic", "claude-sonnet-4-20250514")
            },
        );
        models.set(
            Role::Research,
            RoleConfig {
                max_tokens: Some(8_700),
                temperature: Some(0.1),
                ..RoleConfig::new("perplexity", "sonar-pro")
            },
        );
        models.set(
            Role::Fallback,
            RoleConfig {
                max_tokens: Some(64_000),
                temperature: Some(0.2),
                ..RoleConfig::new("anthropic", "claude-3-7-sonnet-20250219")
            },
        );
        Self {
            models,
            global: GlobalSettings::default(),
        }
    }

    /// Endpoint override for a role: the role's own URL, then the global
    /// ollama URL for ollama roles. `None` means the adapter default.
    pub fn base_url_for(&self, role_config: &RoleConfig) -> Option<String> {
        if let Some(url) = role_config.base_url.as_ref().filter(|u| !u.trim().is_empty()) {
            return Some(url.clone());
        }
        if role_config.provider.eq_ignore_ascii_case("ollama") {
            return self.global.ollama_base_url.clone();
        }
        None
    }
}

/// Walk up from `start` looking for a project marker.
///
/// Markers, checked per directory: `.taskpilot/`, `.taskpilotconfig`, `.git`.
/// Falls back to `start` itself.
pub fn find_project_root(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        if dir.join(CONFIG_DIR).is_dir()
            || dir.join(LEGACY_CONFIG_FILE).is_file()
            || dir.join(".git").exists()
        {
            return dir.to_path_buf();
        }
    }
    start.to_path_buf()
}

/// Reads and writes the configuration of one project.
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    pub fn for_project(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of the current-format configuration file.
    pub fn path(&self) -> PathBuf {
        self.root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    pub fn legacy_path(&self) -> PathBuf {
        self.root.join(LEGACY_CONFIG_FILE)
    }

    /// Load the project configuration. No file is an error, never a default.
    pub fn load(&self) -> Result<ProjectConfig, ServiceError> {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(content) => return parse(&path, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let legacy = self.legacy_path();
        match fs::read_to_string(&legacy) {
            Ok(content) => {
                warn!(
                    path = %legacy.display(),
                    "Using legacy configuration file; move it to {}/{}",
                    CONFIG_DIR,
                    CONFIG_FILE
                );
                parse(&legacy, &content)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ServiceError::ConfigurationMissing { path })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Save the configuration in the current format.
    pub fn save(&self, config: &ProjectConfig) -> Result<PathBuf, ServiceError> {
        let path = self.path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(config).map_err(|e| {
            ServiceError::InvalidConfig {
                path: path.clone(),
                message: e.to_string(),
            }
        })?;
        fs::write(&path, content)?;
        debug!(path = %path.display(), "Saved project configuration");
        Ok(path)
    }
}

fn parse(path: &Path, content: &str) -> Result<ProjectConfig, ServiceError> {
    serde_json::from_str(content).map_err(|e| ServiceError::InvalidConfig {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
