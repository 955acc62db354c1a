//! The `autotagger tag` command.

use autotagger_core::output::summary;
use autotagger_core::{
    Config, Field, Flag, OutputFormat as CoreOutputFormat, OutputWriter, QueryOutput, RunMode,
    TaggingSession, Update,
};
use clap::{Args, ValueEnum};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

/// Report formats.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ReportFormat {
    /// Single JSON document
    Json,
    /// One image per line (newline-delimited)
    Jsonl,
}

impl From<ReportFormat> for CoreOutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Json => CoreOutputFormat::Json,
            ReportFormat::Jsonl => CoreOutputFormat::JsonLines,
        }
    }
}

/// Arguments for the `tag` command.
#[derive(Args, Debug, Default)]
pub struct TagArgs {
    /// Image files, directories or glob patterns
    #[arg(required = true)]
    pub input: Vec<String>,

    /// Model to run (repeat to merge several models)
    #[arg(short, long = "model")]
    pub models: Vec<String>,

    /// Confidence threshold in [0, 1]
    #[arg(short, long)]
    pub threshold: Option<String>,

    /// Tags kept regardless of the threshold (comma-separated)
    #[arg(long)]
    pub keep: Option<String>,

    /// Tags always removed (comma-separated)
    #[arg(long)]
    pub exclude: Option<String>,

    /// Tags always added (comma-separated)
    #[arg(long)]
    pub add: Option<String>,

    /// Tags to rename (comma-separated, paired with --replace)
    #[arg(long)]
    pub search: Option<String>,

    /// New names for --search tags; a missing entry removes the tag
    #[arg(long)]
    pub replace: Option<String>,

    /// Directory for per-image tags files
    #[arg(long)]
    pub output_dir: Option<String>,

    /// Report file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Report format (defaults to `output.format` from the config)
    #[arg(short, long, value_enum)]
    pub format: Option<ReportFormat>,

    /// Stream the batch through the model: a read-only dry run, then the live pass
    #[arg(long)]
    pub large_batch: bool,

    /// Number of tags in the stderr summary
    #[arg(long, default_value = "20")]
    pub top: usize,

    /// Don't print the summary or write a report to stdout
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the tag command.
pub async fn execute(args: TagArgs, config: Config) -> anyhow::Result<()> {
    let mut session = TaggingSession::from_config(&config);
    apply_fields(&mut session, &args)?;
    if args.large_batch && !session.flag(Flag::LargeQuery) {
        session.toggle(Flag::LargeQuery);
    }

    let mut interrogator = super::build_interrogator(&config, &args.models)?;
    let streaming = session.flag(Flag::LargeQuery) && interrogator.mode() != RunMode::Disabled;
    if session.flag(Flag::LargeQuery) && !streaming {
        tracing::warn!("Large-batch mode needs a single streaming model; tagging image by image");
    }

    let total = session.images().len();
    tracing::info!(
        "Tagging {} image(s) with {}",
        total,
        interrogator.model_names().join(", ")
    );

    let progress = create_spinner(total);
    let result = tokio::task::spawn_blocking(move || {
        let mut output = interrogator.batch_interrogate(&mut session)?;
        // A fresh interrogator starts with the dry run; follow it with the live pass.
        if streaming && interrogator.mode() == RunMode::Live {
            output = interrogator.batch_interrogate(&mut session)?;
        }
        Ok::<_, autotagger_core::RunError>(output)
    })
    .await?;
    progress.finish_and_clear();

    let output = result?;
    write_report(&output, &args, &config)?;
    if !args.quiet {
        eprintln!("{}", summary(&output, args.top));
    }
    Ok(())
}

/// Push every field given on the command line through the session.
///
/// Search is applied before replace so the pair is validated as given.
fn apply_fields(session: &mut TaggingSession, args: &TagArgs) -> anyhow::Result<()> {
    let fields = [
        (Field::Threshold, &args.threshold),
        (Field::Keep, &args.keep),
        (Field::Exclude, &args.exclude),
        (Field::Add, &args.add),
        (Field::Search, &args.search),
        (Field::Replace, &args.replace),
        (Field::OutputDir, &args.output_dir),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            reject(field, session.set(field, value))?;
        }
    }

    let input = args.input.join(",");
    reject(Field::InputGlob, session.set(Field::InputGlob, &input))
}

fn reject(field: Field, update: Update) -> anyhow::Result<()> {
    match update {
        Update::Rejected { error, .. } => {
            anyhow::bail!("Invalid {}: {}", field.name().replace('_', "-"), error)
        }
        _ => Ok(()),
    }
}

fn write_report(output: &QueryOutput, args: &TagArgs, config: &Config) -> anyhow::Result<()> {
    let format = match args.format {
        Some(format) => format.into(),
        None => CoreOutputFormat::parse(&config.output.format).unwrap_or(CoreOutputFormat::Json),
    };

    if let Some(path) = &args.output {
        let file = File::create(path)?;
        let mut writer = OutputWriter::new(BufWriter::new(file), format, config.output.pretty);
        writer.write_report(output)?;
        writer.flush()?;
        tracing::info!("Report written to {:?} ({} rows)", path, writer.rows_written());
    } else if !args.quiet {
        let stdout = std::io::stdout().lock();
        let mut writer = OutputWriter::new(stdout, format, config.output.pretty);
        writer.write_report(output)?;
        writer.flush()?;
    }
    Ok(())
}

fn create_spinner(total: usize) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};

    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("tagging {} image(s)...", total));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        // Resolution only looks at extensions.
        for name in ["a.png", "b.png"] {
            std::fs::write(dir.path().join(name), b"png").unwrap();
        }
        dir
    }

    fn args(input: &std::path::Path) -> TagArgs {
        TagArgs {
            input: vec![input.to_string_lossy().into_owned()],
            top: 20,
            ..TagArgs::default()
        }
    }

    #[test]
    fn apply_fields_sets_filters_and_inputs() {
        let dir = image_dir();
        let mut session = TaggingSession::from_config(&Config::default());
        let mut args = args(dir.path());
        args.threshold = Some("0.6".to_string());
        args.search = Some("a,b".to_string());
        args.replace = Some("x".to_string());

        apply_fields(&mut session, &args).unwrap();
        assert_eq!(session.filters().threshold, 0.6);
        assert_eq!(session.filters().search, vec!["a", "b"]);
        assert_eq!(session.images().len(), 2);
    }

    #[test]
    fn apply_fields_reports_rejected_field() {
        let dir = image_dir();
        let mut session = TaggingSession::from_config(&Config::default());
        let mut args = args(dir.path());
        args.threshold = Some("1.5".to_string());

        let err = apply_fields(&mut session, &args).unwrap_err().to_string();
        assert!(err.starts_with("Invalid threshold:"), "{err}");
    }

    #[test]
    fn apply_fields_rejects_empty_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = TaggingSession::from_config(&Config::default());
        let err = apply_fields(&mut session, &args(dir.path()))
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("Invalid input-glob:"), "{err}");
    }

    #[test]
    fn report_format_maps_to_core() {
        assert_eq!(
            CoreOutputFormat::from(ReportFormat::Jsonl),
            CoreOutputFormat::JsonLines
        );
    }
}
