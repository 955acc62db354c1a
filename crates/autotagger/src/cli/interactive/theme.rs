//! Dialoguer theme and banner for interactive mode.

use console::{style, Style};
use dialoguer::theme::ColorfulTheme;

/// A `ColorfulTheme` with stderr styling throughout.
///
/// Magenta prompts and selection, green checks and values, red errors.
pub fn autotagger_theme() -> ColorfulTheme {
    let grey = || Style::new().for_stderr().bright().black();
    let glyph = |s: &str| style(s.to_string()).for_stderr();

    ColorfulTheme {
        prompt_prefix: glyph("#").magenta(),
        prompt_style: Style::new().for_stderr().bold(),
        prompt_suffix: grey().apply_to("›".to_string()),
        active_item_prefix: glyph("❯").magenta(),
        active_item_style: Style::new().for_stderr().magenta(),
        checked_item_prefix: glyph("◉").green(),
        unchecked_item_prefix: grey().apply_to("○".to_string()),
        success_prefix: glyph("✓").green(),
        success_suffix: grey().apply_to("·".to_string()),
        error_prefix: glyph("✗").red(),
        error_style: Style::new().for_stderr().red(),
        values_style: Style::new().for_stderr().green(),
        ..ColorfulTheme::default()
    }
}

/// Prints the version banner to stderr so stdout stays clean for reports.
pub fn print_banner() {
    let version_line = format!("Autotagger v{}", autotagger_core::VERSION);
    let tagline = "Cached image tagging with replayable filters";
    let inner_width = tagline.chars().count() + 4;

    let frame = Style::new().for_stderr().magenta();
    eprintln!();
    eprintln!("{}", frame.apply_to(format!("  ┌{:─<inner_width$}┐", "")));
    for line in [version_line.as_str(), tagline] {
        eprintln!("{}", frame.apply_to(format!("  │{:^inner_width$}│", line)));
    }
    eprintln!("{}", frame.apply_to(format!("  └{:─<inner_width$}┘", "")));
    eprintln!();
}
