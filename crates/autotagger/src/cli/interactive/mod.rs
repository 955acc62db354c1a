//! Interactive mode: a menu-driven tagging session for bare `autotagger`.
//!
//! One [`TaggingSession`] lives for the whole menu loop, so the query cache
//! survives between runs and edited filters replay cached results.
//!
//! Runs on a blocking thread; downloads re-enter the runtime through
//! [`tokio::runtime::Handle`].

pub mod fields;
pub mod models;
pub mod theme;

use autotagger_core::output::summary;
use autotagger_core::pipeline::ImageDecoder;
use autotagger_core::{Config, Flag, Interrogator, QueryOutput, RunError, TaggingSession};
use console::Style;
use dialoguer::{Input, Select};
use std::path::PathBuf;

/// Convert a dialoguer result into `Ok(Some(value))` on success, `Ok(None)` on
/// interrupt (Ctrl+C / terminal disconnect), and `Err` for other I/O failures.
fn handle_interrupt<T>(result: dialoguer::Result<T>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
        Err(e) => Err(e.into()),
    }
}

const MENU_ITEMS: &[&str] = &[
    "Tag one image",
    "Tag input images",
    "Edit fields",
    "Toggle options",
    "Models",
    "Unload models",
    "Exit",
];

/// Tags shown after each run.
const SUMMARY_TOP: usize = 20;

struct State {
    config: Config,
    session: TaggingSession,
    models: Vec<String>,
    interrogator: Option<Interrogator>,
}

/// The interrogator for the selected models, built on first use.
fn ensure_interrogator<'a>(
    slot: &'a mut Option<Interrogator>,
    config: &Config,
    models: &[String],
) -> anyhow::Result<&'a mut Interrogator> {
    if slot.is_none() {
        *slot = Some(super::build_interrogator(config, models)?);
    }
    slot.as_mut().ok_or_else(|| anyhow::anyhow!("no models selected"))
}

/// Entry point for interactive mode.
pub fn run(config: Config) -> anyhow::Result<()> {
    theme::print_banner();
    let theme = theme::autotagger_theme();

    let mut state = State {
        session: TaggingSession::from_config(&config),
        models: config.models.first().map(|m| m.name.clone()).into_iter().collect(),
        interrogator: None,
        config,
    };

    loop {
        let selection = Select::with_theme(&theme)
            .with_prompt("What would you like to do?")
            .items(MENU_ITEMS)
            .default(0)
            .interact_opt()?;

        match selection {
            Some(0) => tag_one(&mut state)?,
            Some(1) => tag_inputs(&mut state)?,
            Some(2) => fields::edit_fields(&mut state.session)?,
            Some(3) => fields::toggle_flags(&mut state.session)?,
            Some(4) => {
                if models::guided_models(&state.config, &mut state.models)? {
                    state.interrogator = None;
                }
            }
            Some(5) => unload(&mut state),
            Some(6) | None => break,
            _ => unreachable!(),
        }
    }

    Ok(())
}

fn tag_one(state: &mut State) -> anyhow::Result<()> {
    let input = Input::<String>::with_theme(&theme::autotagger_theme())
        .with_prompt("Image path")
        .interact_text();
    let Some(raw) = handle_interrupt(input)? else {
        return Ok(());
    };
    let path = PathBuf::from(shellexpand::tilde(raw.trim()).into_owned());

    let decoder = ImageDecoder::new(state.config.limits.clone());
    let image = match decoder.decode(&path) {
        Ok(image) => image,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(());
        }
    };

    let interrogator =
        match ensure_interrogator(&mut state.interrogator, &state.config, &state.models) {
            Ok(interrogator) => interrogator,
            Err(e) => {
                print_error(&e.to_string());
                return Ok(());
            }
        };
    let result = interrogator.interrogate_image(&mut state.session, &image);
    show(result);
    Ok(())
}

fn tag_inputs(state: &mut State) -> anyhow::Result<()> {
    let dim = Style::new().for_stderr().dim();
    let count = state.session.images().len();
    let large = state.session.flag(Flag::LargeQuery);

    let interrogator =
        match ensure_interrogator(&mut state.interrogator, &state.config, &state.models) {
            Ok(interrogator) => interrogator,
            Err(e) => {
                print_error(&e.to_string());
                return Ok(());
            }
        };
    if large {
        eprintln!(
            "  {}",
            dim.apply_to(format!("Large batch: next pass is {}", interrogator.mode()))
        );
    }
    eprintln!("  {}", dim.apply_to(format!("Tagging {} image(s)...", count)));

    let result = interrogator.batch_interrogate(&mut state.session);
    show(result);
    Ok(())
}

fn unload(state: &mut State) {
    let Some(interrogator) = state.interrogator.as_mut() else {
        eprintln!("  No models loaded.");
        return;
    };
    for (name, freed) in interrogator.unload() {
        let note = if freed { "unloaded" } else { "kept resident" };
        eprintln!("  {}: {}", name, note);
    }
}

fn show(result: Result<QueryOutput, RunError>) {
    match result {
        Ok(output) => {
            eprintln!();
            eprintln!("{}", summary(&output, SUMMARY_TOP));
        }
        Err(e) => print_error(&e.to_string()),
    }
}

fn print_error(message: &str) {
    let red = Style::new().for_stderr().red();
    eprintln!("  {} {}", red.apply_to("✗"), message);
    eprintln!();
}
