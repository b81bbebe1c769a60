use std::collections::HashMap;
use std::env;

use config::{Config, Environment, File};
use serde::Deserialize;

/// Load a settings object from the config locations.
///
/// Configs are loaded in the following precedence order:
///
/// 1. The file specified by `RUN_ENV`/`config_file_name`, if given.
/// 2. `config/<RUN_ENV>/<agent_prefix>-partial.json`, if present.
/// 3. Configuration env vars with the prefix `TCC_BASE`, shared across agents.
/// 4. Configuration env vars with the prefix `TCC_<agent_prefix>`, agent-specific.
///
/// Specify a configuration directory with the `RUN_ENV` env variable.
pub fn load_settings_object<'de, T: Deserialize<'de>, S: AsRef<str>>(
    agent_prefix: &str,
    config_file_name: Option<&str>,
    ignore_prefixes: &[S],
) -> eyre::Result<T> {
    let env = env::var("RUN_ENV").unwrap_or_else(|_| "default".into());

    let prefix = format!("TCC_{}", agent_prefix).to_ascii_uppercase();

    let filtered_env: HashMap<String, String> = env::vars()
        .filter(|(k, _v)| {
            !ignore_prefixes
                .iter()
                .any(|prefix| k.starts_with(prefix.as_ref()))
        })
        .collect();

    let builder = Config::builder();
    let builder = if let Some(fname) = config_file_name {
        builder.add_source(File::with_name(&format!("./config/{}/{}", env, fname)))
    } else {
        builder
    };
    let config_deserializer = builder
        .add_source(
            File::with_name(&format!(
                "./config/{}/{}-partial",
                env,
                agent_prefix.to_lowercase()
            ))
            .required(false),
        )
        .add_source(
            Environment::with_prefix("TCC_BASE")
                .separator("_")
                .source(Some(filtered_env.clone())),
        )
        .add_source(
            Environment::with_prefix(&prefix)
                .separator("_")
                .source(Some(filtered_env)),
        )
        .build()?;

    Ok(serde_path_to_error::deserialize(config_deserializer)?)
}
