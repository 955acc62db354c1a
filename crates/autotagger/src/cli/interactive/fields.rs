//! Field editor and option toggles for the interactive session.

use autotagger_core::{Field, Flag, TaggingSession, Update};
use console::Style;
use dialoguer::{Input, Select};

use super::handle_interrupt;
use super::theme::autotagger_theme;

const FLAGS: [(Flag, &str); 3] = [
    (Flag::Cumulative, "Cumulative (keep cache between queries)"),
    (Flag::LargeQuery, "Large batch (dry run, then live streaming)"),
    (Flag::UnloadAfter, "Unload models after each run"),
];

/// Menu line for one field: name, current value and any standing error.
pub fn field_line(session: &TaggingSession, field: Field) -> String {
    let value = match session.value(field) {
        "" => "(empty)",
        value => value,
    };
    match session.error(field) {
        Some(error) => format!("{:<12} {}  [{}]", field.name(), value, error),
        None => format!("{:<12} {}", field.name(), value),
    }
}

/// Repeatedly pick a field and set it until the user backs out.
pub fn edit_fields(session: &mut TaggingSession) -> anyhow::Result<()> {
    let theme = autotagger_theme();

    loop {
        let mut items: Vec<String> = Field::ALL.iter().map(|f| field_line(session, *f)).collect();
        items.push("Back".to_string());

        let Some(idx) = Select::with_theme(&theme)
            .with_prompt("Edit a field")
            .items(&items)
            .default(0)
            .interact_opt()?
        else {
            return Ok(());
        };
        let Some(field) = Field::ALL.get(idx).copied() else {
            return Ok(());
        };

        let input = Input::<String>::with_theme(&theme)
            .with_prompt(field.name())
            .with_initial_text(session.value(field))
            .allow_empty(true)
            .interact_text();
        if let Some(value) = handle_interrupt(input)? {
            report(field, &session.set(field, &value));
        }
    }
}

/// Flip session options until the user backs out.
pub fn toggle_flags(session: &mut TaggingSession) -> anyhow::Result<()> {
    let theme = autotagger_theme();

    loop {
        let mut items: Vec<String> = FLAGS
            .iter()
            .map(|(flag, label)| {
                let state = if session.flag(*flag) { "on " } else { "off" };
                format!("[{}] {}", state, label)
            })
            .collect();
        items.push("Back".to_string());

        let Some(idx) = Select::with_theme(&theme)
            .with_prompt("Toggle an option")
            .items(&items)
            .default(0)
            .interact_opt()?
        else {
            return Ok(());
        };
        match FLAGS.get(idx) {
            Some((flag, _)) => {
                session.toggle(*flag);
            }
            None => return Ok(()),
        }
    }
}

fn report(field: Field, update: &Update) {
    let dim = Style::new().for_stderr().dim();
    match update {
        Update::Unchanged(_) => {
            eprintln!("  {}", dim.apply_to(format!("{} unchanged", field.name())));
        }
        Update::Applied(value) => {
            let green = Style::new().for_stderr().green();
            eprintln!("  {} {} = {}", green.apply_to("✓"), field.name(), value);
        }
        Update::Rejected { current, error } => {
            let red = Style::new().for_stderr().red();
            eprintln!(
                "  {} {}: {} (keeping {:?})",
                red.apply_to("✗"),
                field.name(),
                error,
                current
            );
        }
    }
}
