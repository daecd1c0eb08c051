//! Output formatting: text, JSON, YAML.
//!
//! Renders data in the format selected by `--output`. Text is a
//! human-readable report; structured formats serialize via serde.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Pass/fail/dim markers, colored or plain.
#[derive(Debug, Clone, Copy)]
pub struct Painter {
    color: bool,
}

impl Painter {
    pub fn new(mode: ColorMode) -> Self {
        Self {
            color: should_color(mode),
        }
    }

    pub fn pass(self, text: &str) -> String {
        if self.color {
            text.green().bold().to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn fail(self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_owned()
        }
    }

    pub fn dim(self, text: &str) -> String {
        if self.color {
            text.dimmed().to_string()
        } else {
            text.to_owned()
        }
    }
}

// ── Render dispatch ──────────────────────────────────────────────────

/// Render a serde-serializable value in the chosen format. Text uses
/// `text_fn`.
pub fn render<T>(
    format: OutputFormat,
    data: &T,
    text_fn: impl FnOnce(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    match format {
        OutputFormat::Text => Ok(text_fn(data)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(data)?),
        OutputFormat::JsonCompact => Ok(serde_json::to_string(data)?),
        OutputFormat::Yaml => serde_yaml::to_string(data)
            .map_err(|e| CliError::Internal(format!("YAML serialization failed: {e}"))),
    }
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", output.trim_end_matches('\n'));
}
