//! Terminal palette for migration states and CLI messages.

use colored::control::ShouldColorize;
use colored::{Color, Colorize};
use comfy_table::{Cell, Color as TableColor};
use once_cell::sync::Lazy;
use std::fmt::Display;

use vowmigrate::MigrationStatus;

/// Color support detected from the environment (`NO_COLOR`, `CLICOLOR`, tty).
pub static TERMINAL_COLOR: Lazy<bool> = Lazy::new(|| ShouldColorize::from_env().should_colorize());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Success,
    Failure,
    Warning,
    Info,
    Pending,
    Undone,
    Muted,
}

impl Tone {
    pub fn for_status(status: MigrationStatus) -> Self {
        match status {
            MigrationStatus::Completed => Tone::Success,
            MigrationStatus::Failed => Tone::Failure,
            MigrationStatus::RolledBack => Tone::Undone,
            MigrationStatus::Pending => Tone::Pending,
        }
    }

    pub fn for_outcome(success: bool) -> Self {
        if success { Tone::Success } else { Tone::Failure }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Tone::Success => "✓",
            Tone::Failure => "✗",
            Tone::Warning => "⚠",
            Tone::Info => "ℹ",
            Tone::Pending => "…",
            Tone::Undone => "↺",
            Tone::Muted => "•",
        }
    }

    fn color(self) -> Color {
        match self {
            Tone::Success => Color::Green,
            Tone::Failure => Color::Red,
            Tone::Warning | Tone::Undone => Color::Yellow,
            Tone::Info => Color::Blue,
            Tone::Pending | Tone::Muted => Color::BrightBlack,
        }
    }

    fn table_color(self) -> TableColor {
        match self {
            Tone::Success => TableColor::Green,
            Tone::Failure => TableColor::Red,
            Tone::Warning | Tone::Undone => TableColor::Yellow,
            Tone::Info => TableColor::Blue,
            Tone::Pending | Tone::Muted => TableColor::DarkGrey,
        }
    }

    /// `icon text`, colored when `color` is set.
    pub fn paint(self, text: &str, color: bool) -> String {
        if color {
            format!("{} {}", self.icon().color(self.color()), text.color(self.color()))
        } else {
            format!("{} {text}", self.icon())
        }
    }

    pub fn cell(self, text: impl Display, color: bool) -> Cell {
        let cell = Cell::new(format!("{} {text}", self.icon()));
        if color { cell.fg(self.table_color()) } else { cell }
    }
}
