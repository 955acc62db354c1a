//! The `autotagger models` command: download, list and locate tagger models.

use autotagger_core::adapter::WaifuDiffusionAdapter;
use autotagger_core::{Config, ModelFamily, ModelRegistry, ModelSpec, RegistryEntry};
use clap::{Args, Subcommand};
use std::path::Path;

/// Arguments for the `models` command.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: ModelsCommand,
}

/// Subcommands for model management.
#[derive(Subcommand, Debug)]
pub enum ModelsCommand {
    /// Download a configured model (defaults to the first one)
    Download {
        /// Model name from the config
        name: Option<String>,

        /// Download every configured hub model
        #[arg(long, conflicts_with = "name")]
        all: bool,
    },

    /// List configured and downloaded models
    List,

    /// Show model directory path
    Path,
}

/// Where a configured model stands on this machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelStatus {
    /// Listed in the registry with both artifacts present
    Registered,
    /// Artifacts present in the default location but not registered
    Present,
    /// Local DeepDanbooru project directory
    Local,
    Missing,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Registered => write!(f, "ready"),
            ModelStatus::Present => write!(f, "ready (unregistered)"),
            ModelStatus::Local => write!(f, "local project"),
            ModelStatus::Missing => write!(f, "not installed"),
        }
    }
}

/// Check whether a model's artifacts are available.
pub fn model_status(spec: &ModelSpec, config: &Config) -> ModelStatus {
    if spec.family == ModelFamily::DeepDanbooru {
        return match &spec.project_path {
            Some(path) if path.join(&spec.model_file).exists() => ModelStatus::Local,
            _ => ModelStatus::Missing,
        };
    }

    let registry = ModelRegistry::new(config.registry_path());
    if registry.find(&spec.name).is_some() {
        return ModelStatus::Registered;
    }
    let (model_path, tags_path) = WaifuDiffusionAdapter::default_paths(spec, &config.model_dir());
    if model_path.exists() && tags_path.exists() {
        ModelStatus::Present
    } else {
        ModelStatus::Missing
    }
}

/// Hub URL of one file in a model repository.
pub fn file_url(repo_id: &str, file: &str) -> String {
    format!("https://huggingface.co/{}/resolve/main/{}", repo_id, file)
}

/// Download a hub model and record it in the registry.
///
/// Skips files already on disk and models already registered.
pub async fn download_model(
    spec: &ModelSpec,
    config: &Config,
    client: &reqwest::Client,
) -> anyhow::Result<RegistryEntry> {
    let registry = ModelRegistry::new(config.registry_path());
    if let Some(entry) = registry.find(&spec.name) {
        tracing::info!("{} already downloaded ({:?})", spec.name, entry.model_path);
        return Ok(entry);
    }

    let Some(repo_id) = spec.repo_id.as_deref() else {
        anyhow::bail!(
            "Model '{}' has no repo_id. DeepDanbooru projects are used from their project_path.",
            spec.name
        );
    };

    let (model_path, tags_path) = WaifuDiffusionAdapter::default_paths(spec, &config.model_dir());
    for (file, dest) in [(&spec.model_file, &model_path), (&spec.tags_file, &tags_path)] {
        if dest.exists() {
            tracing::info!("{} already exists at {:?}", file, dest);
            continue;
        }
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = file_url(repo_id, file);
        tracing::info!("Downloading {} for {}...", file, spec.name);
        tracing::info!("  Source: {}", url);
        tracing::info!("  Destination: {:?}", dest);
        download_file(client, &url, dest).await?;
    }

    let entry = RegistryEntry {
        name: spec.name.clone(),
        model_path,
        tags_path,
    };
    registry.append(entry.clone())?;
    tracing::info!("Registered {} in {:?}", spec.name, registry.path());
    Ok(entry)
}

/// Execute the models command.
pub async fn execute(args: ModelsArgs, config: Config) -> anyhow::Result<()> {
    match args.command {
        ModelsCommand::Download { name, all } => {
            let specs: Vec<&ModelSpec> = if all {
                config
                    .models
                    .iter()
                    .filter(|m| m.family == ModelFamily::WaifuDiffusion)
                    .collect()
            } else {
                let spec = match &name {
                    Some(name) => config.model(name),
                    None => config.models.first(),
                };
                match spec {
                    Some(spec) => vec![spec],
                    None => anyhow::bail!(
                        "Unknown model '{}'. Run `autotagger models list` for choices.",
                        name.unwrap_or_default()
                    ),
                }
            };

            let client = reqwest::Client::new();
            for spec in specs {
                download_model(spec, &config, &client).await?;
            }
            tracing::info!("All downloads complete.");
        }

        ModelsCommand::List => {
            println!("Models:");
            println!("  Directory: {}\n", config.model_dir().display());
            for (i, spec) in config.models.iter().enumerate() {
                let default_marker = if i == 0 { "  (default)" } else { "" };
                println!(
                    "  - {:24} {:16} {:22}{}",
                    spec.name,
                    spec.family.to_string(),
                    model_status(spec, &config).to_string(),
                    default_marker
                );
            }

            let registry = ModelRegistry::new(config.registry_path());
            match registry.entries() {
                Ok(entries) if !entries.is_empty() => {
                    println!("\n  Registry ({}):", registry.path().display());
                    for entry in entries {
                        println!("    - {:24} {}", entry.name, entry.model_path.display());
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("{}", e),
            }
        }

        ModelsCommand::Path => {
            println!("{}", config.model_dir().display());
        }
    }

    Ok(())
}

/// Stream a URL to disk with a byte progress bar.
///
/// Data lands in a `.part` file that is renamed once complete, so an
/// interrupted download never looks finished.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> anyhow::Result<()> {
    use futures_util::StreamExt;
    use tokio::io::AsyncWriteExt;

    let response = client
        .get(url)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| anyhow::anyhow!("Download failed: {e}"))?;

    let progress = create_download_bar(response.content_length());
    let partial = dest.with_extension("part");
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        progress.inc(chunk.len() as u64);
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&partial, dest).await?;
    progress.finish_and_clear();
    tracing::info!(
        "  Complete ({:.1} MB)",
        std::fs::metadata(dest)?.len() as f64 / (1024.0 * 1024.0)
    );
    Ok(())
}

fn create_download_bar(total: Option<u64>) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = match total {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb
}
