//! `taskpilot models`

use crate::cli::ModelsArgs;
use std::path::Path;
use taskpilot_core::{
    resolve_credential, ConfigStore, ProjectConfig, Role, RoleConfig, ServiceError,
};
use taskpilot_provider::ProviderRegistry;
use tracing::warn;

pub fn run(
    args: &ModelsArgs,
    project_root: &Path,
    registry: &ProviderRegistry,
) -> anyhow::Result<()> {
    let store = ConfigStore::for_project(project_root);

    if args.setup {
        let path = store.path();
        if path.exists() && !args.force {
            anyhow::bail!(
                "Configuration already exists at {}. Use --force to overwrite it.",
                path.display()
            );
        }
        let path = store.save(&ProjectConfig::default_config())?;
        println!("Wrote default configuration to {}", path.display());
    }

    let assignments = args.assignments();
    if !assignments.is_empty() {
        let mut config = store.load()?;
        for (role, provider, model) in assignments {
            assign_role(&mut config, registry, role, &provider, &model)?;
            println!("Set {role} model to {provider}/{model}");
        }
        store.save(&config)?;
        return Ok(());
    }

    if !args.setup {
        show(&store.load()?, registry, project_root);
    }
    Ok(())
}

/// Point `role` at `provider`/`model`.
///
/// Unknown providers are rejected. Unknown model ids are accepted with a
/// warning since catalogs lag behind the backends.
pub fn assign_role(
    config: &mut ProjectConfig,
    registry: &ProviderRegistry,
    role: Role,
    provider: &str,
    model: &str,
) -> Result<(), ServiceError> {
    let adapter = registry
        .get(provider)
        .ok_or_else(|| ServiceError::UnknownProvider {
            role,
            provider: provider.to_string(),
        })?;

    let info = adapter.model_info(model);
    if info.is_none() && !adapter.models().is_empty() {
        warn!(provider, model, "Model is not in the known catalog for this provider");
    }

    let previous = config.models.get(role).cloned();
    let entry = RoleConfig {
        provider: adapter.name().to_string(),
        model_id: model.to_string(),
        max_tokens: info
            .as_ref()
            .map(|i| i.max_output_tokens)
            .or_else(|| previous.as_ref().and_then(|p| p.max_tokens)),
        temperature: previous
            .as_ref()
            .and_then(|p| p.temperature)
            .or(Some(0.2)),
        base_url: previous
            .filter(|p| p.provider.eq_ignore_ascii_case(provider))
            .and_then(|p| p.base_url),
    };
    config.models.set(role, entry);
    Ok(())
}

fn show(config: &ProjectConfig, registry: &ProviderRegistry, project_root: &Path) {
    for role in Role::ALL {
        let Some(entry) = config.models.get(role) else {
            println!("{role:<9} not configured");
            continue;
        };

        let adapter = registry.get(&entry.provider);
        let key = match &adapter {
            None => "unknown provider",
            Some(a) if !a.requires_api_key() => "no key needed",
            Some(a) if resolve_credential(a.as_ref(), None, project_root).is_some() => "key set",
            Some(_) => "key missing",
        };
        let structured = adapter
            .as_ref()
            .and_then(|a| a.model_info(&entry.model_id))
            .map(|m| if m.supports_structured_output { "yes" } else { "no" })
            .unwrap_or("unknown");

        println!(
            "{role:<9} {}/{}  maxTokens={}  temperature={}  structured={structured}  [{key}]",
            entry.provider,
            entry.model_id,
            entry
                .max_tokens
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            entry
                .temperature
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
}
