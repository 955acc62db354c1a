//! Command implementations.

pub mod config;
pub mod interactive;
pub mod models;
pub mod tag;

use autotagger_core::{adapter, Config, Interrogator};
use std::path::Path;

/// Load the config from an explicit path or the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Build an interrogator over the named models, or the first configured one.
pub fn build_interrogator(config: &Config, names: &[String]) -> anyhow::Result<Interrogator> {
    let specs = if names.is_empty() {
        match config.models.first() {
            Some(spec) => vec![spec],
            None => anyhow::bail!("No models configured. Add a [[models]] entry to the config."),
        }
    } else {
        names
            .iter()
            .map(|name| {
                config.model(name).ok_or_else(|| {
                    let known: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
                    anyhow::anyhow!("Unknown model '{}'. Configured: {}", name, known.join(", "))
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?
    };

    let adapters = specs
        .into_iter()
        .map(|spec| adapter::from_spec(spec, config))
        .collect();
    Ok(Interrogator::ensemble(adapters, config))
}
