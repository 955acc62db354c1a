//! Guided model management: pick the models to tag with and fetch missing ones.

use crate::cli::models::{download_model, model_status, ModelStatus};
use autotagger_core::{Config, ModelFamily};
use console::Style;
use dialoguer::{MultiSelect, Select};

use super::theme::autotagger_theme;

enum ModelAction {
    Choose,
    Download(usize),
    ShowPath,
    Back,
}

/// Show model status and offer selection and downloads.
///
/// Returns `true` when `selected` changed, so the caller can rebuild its
/// interrogator.
pub fn guided_models(config: &Config, selected: &mut Vec<String>) -> anyhow::Result<bool> {
    let theme = autotagger_theme();
    let mut changed = false;

    loop {
        print_status(config, selected);

        let mut items = vec!["Choose models for tagging".to_string()];
        let mut actions = vec![ModelAction::Choose];
        for (i, spec) in config.models.iter().enumerate() {
            if spec.family == ModelFamily::WaifuDiffusion
                && model_status(spec, config) == ModelStatus::Missing
            {
                items.push(format!("Download {}", spec.name));
                actions.push(ModelAction::Download(i));
            }
        }
        items.push("Show model directory".to_string());
        actions.push(ModelAction::ShowPath);
        items.push("Back".to_string());
        actions.push(ModelAction::Back);

        let selection = Select::with_theme(&theme)
            .with_prompt("Models")
            .items(&items)
            .default(0)
            .interact_opt()?;

        match selection.and_then(|idx| actions.get(idx)) {
            Some(ModelAction::Choose) => {
                if let Some(names) = choose(config, selected)? {
                    if names != *selected {
                        *selected = names;
                        changed = true;
                    }
                }
            }
            Some(ModelAction::Download(i)) => {
                let spec = &config.models[*i];
                let client = reqwest::Client::new();
                let result = tokio::runtime::Handle::current()
                    .block_on(download_model(spec, config, &client));
                if let Err(e) = result {
                    let red = Style::new().for_stderr().red();
                    eprintln!("  {} {}: {e}", red.apply_to("✗"), spec.name);
                }
            }
            Some(ModelAction::ShowPath) => {
                eprintln!();
                eprintln!("  {}", config.model_dir().display());
                eprintln!();
            }
            Some(ModelAction::Back) | None => return Ok(changed),
        }
    }
}

/// Multi-select over configured models. An empty choice keeps the current one.
fn choose(config: &Config, selected: &[String]) -> anyhow::Result<Option<Vec<String>>> {
    let names: Vec<&str> = config.models.iter().map(|m| m.name.as_str()).collect();
    let defaults: Vec<bool> = names
        .iter()
        .map(|name| selected.iter().any(|s| s == name))
        .collect();

    let picked = MultiSelect::with_theme(&autotagger_theme())
        .with_prompt("Models to run (space to toggle; several are merged by max confidence)")
        .items(&names)
        .defaults(&defaults)
        .interact_opt()?;

    Ok(picked
        .filter(|indices| !indices.is_empty())
        .map(|indices| indices.into_iter().map(|i| names[i].to_string()).collect()))
}

fn print_status(config: &Config, selected: &[String]) {
    let dim = Style::new().for_stderr().dim();
    let green = Style::new().for_stderr().green();
    let yellow = Style::new().for_stderr().yellow();

    eprintln!();
    for spec in &config.models {
        let status = model_status(spec, config);
        let marker = if selected.contains(&spec.name) { "▸" } else { " " };
        let status_text = match status {
            ModelStatus::Missing => yellow.apply_to(status.to_string()),
            _ => green.apply_to(status.to_string()),
        };
        eprintln!(
            "  {} {:<28} {:<16} {}",
            marker,
            spec.name,
            dim.apply_to(spec.family.to_string()),
            status_text
        );
    }
    eprintln!();
}
