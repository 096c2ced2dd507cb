use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table, presets};
use serde::Serialize;

use crate::theme::Tone;

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tables and status lines for people
    #[default]
    Table,
    /// Reports as JSON on stdout; status lines are suppressed
    Json,
    /// One line per report
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

impl GlobalOptions {
    pub fn color(&self) -> bool {
        !self.no_color
    }
}

/// A command report that renders as a table, a compact line or JSON.
pub trait TableDisplay {
    fn to_table(&self, color: bool) -> Table;
    fn to_compact(&self) -> String;
}

/// Table with a bold header row. Colored output uses box drawing, plain output ASCII.
pub fn report_table(headers: &[&str], color: bool) -> Table {
    let mut table = Table::new();
    table.load_preset(if color { presets::UTF8_FULL_CONDENSED } else { presets::ASCII_FULL });
    table.set_header(headers.iter().map(|header| {
        let cell = Cell::new(header).add_attribute(Attribute::Bold);
        if color { cell.fg(TableColor::Cyan) } else { cell }
    }));
    table
}

pub struct OutputManager {
    options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Status lines are for people only; JSON mode keeps stdout parseable.
    pub fn is_human(&self) -> bool {
        !self.options.quiet && self.options.output_format != OutputFormat::Json
    }

    pub fn display<T>(&self, report: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }
        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
            OutputFormat::Table => println!("{}", report.to_table(self.options.color())),
            OutputFormat::Compact => println!("{}", report.to_compact()),
        }
        Ok(())
    }

    pub fn line(&self, tone: Tone, message: &str) {
        if self.is_human() {
            println!("{}", tone.paint(message, self.options.color()));
        }
    }

    /// Indented line under the previous message.
    pub fn detail(&self, tone: Tone, message: &str) {
        if self.is_human() {
            println!("  {}", tone.paint(message, self.options.color()));
        }
    }

    pub fn success(&self, message: &str) {
        self.line(Tone::Success, message);
    }

    pub fn warning(&self, message: &str) {
        self.line(Tone::Warning, message);
    }

    pub fn info(&self, message: &str) {
        self.line(Tone::Info, message);
    }

    /// Errors go to stderr even in quiet and JSON modes.
    pub fn error(&self, message: &str) {
        eprintln!("{}", Tone::Failure.paint(message, self.options.color()));
    }

    pub fn verbose(&self, message: &str) {
        if self.options.verbose && self.is_human() {
            eprintln!("{}", Tone::Muted.paint(message, self.options.color()));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.is_human() {
            return;
        }
        if self.options.color() {
            println!("\n{}", text.bright_blue().bold());
        } else {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        }
    }
}
