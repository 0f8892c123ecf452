//! CLI argument and command definitions.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use taskpilot_core::{OutputType, Role, ServiceParams};

#[derive(Parser)]
#[command(name = "taskpilot", version, about = "Task-tracking assistant with pluggable AI providers")]
pub struct Cli {
    /// Project root. Defaults to the nearest directory holding
    /// `.taskpilot/`, `.taskpilotconfig` or `.git`.
    #[arg(long, global = true, env = "TASKPILOT_PROJECT_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the full error chain on failure.
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or change the model assigned to each role.
    Models(ModelsArgs),

    /// Generate text for a prompt.
    Generate {
        #[command(flatten)]
        call: CallArgs,

        /// Print the result and usage record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Stream text for a prompt to stdout.
    Stream {
        #[command(flatten)]
        call: CallArgs,
    },

    /// Generate a JSON object matching a schema.
    Object {
        #[command(flatten)]
        call: CallArgs,

        /// Path to a JSON Schema file.
        #[arg(long)]
        schema: PathBuf,

        /// Object (tool) name sent to the model.
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Args)]
pub struct ModelsArgs {
    /// Write a default configuration for this project.
    #[arg(long)]
    pub setup: bool,

    /// Overwrite an existing configuration with `--setup`.
    #[arg(long, requires = "setup")]
    pub force: bool,

    /// Assign the main role.
    #[arg(long, num_args = 2, value_names = ["PROVIDER", "MODEL"])]
    pub set_main: Option<Vec<String>>,

    /// Assign the research role.
    #[arg(long, num_args = 2, value_names = ["PROVIDER", "MODEL"])]
    pub set_research: Option<Vec<String>>,

    /// Assign the fallback role.
    #[arg(long, num_args = 2, value_names = ["PROVIDER", "MODEL"])]
    pub set_fallback: Option<Vec<String>>,
}

impl ModelsArgs {
    /// Requested `(role, provider, model)` assignments.
    pub fn assignments(&self) -> Vec<(Role, String, String)> {
        [
            (Role::Main, &self.set_main),
            (Role::Research, &self.set_research),
            (Role::Fallback, &self.set_fallback),
        ]
        .into_iter()
        .filter_map(|(role, pair)| match pair.as_deref() {
            Some([provider, model]) => Some((role, provider.clone(), model.clone())),
            _ => None,
        })
        .collect()
    }
}

/// Arguments shared by every AI command.
#[derive(Args)]
pub struct CallArgs {
    /// The prompt to send.
    pub prompt: String,

    /// Role whose provider and model handle the call.
    #[arg(long, default_value = "main")]
    pub role: Role,

    /// Optional system prompt.
    #[arg(long)]
    pub system: Option<String>,

    /// Command name recorded in usage telemetry.
    #[arg(long, default_value = "cli")]
    pub command_name: String,

    /// Retries after the first attempt.
    #[arg(long)]
    pub max_retries: Option<u32>,
}

impl CallArgs {
    pub fn into_params(self, project_root: PathBuf) -> ServiceParams {
        let mut params = ServiceParams::new(self.role, self.command_name, self.prompt)
            .output_type(OutputType::Cli)
            .project_root(project_root);
        if let Some(system) = self.system {
            params = params.system_prompt(system);
        }
        if let Some(max_retries) = self.max_retries {
            params = params.max_retries(max_retries);
        }
        params
    }
}
