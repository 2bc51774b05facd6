//! Terminal styling shared by the binaries.

use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Color as CtColor, Stylize};

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Cyan))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Status Lines
// ═══════════════════════════════════════════════════════════════════════════════

const GREEN: CtColor = CtColor::Rgb {
    r: 0,
    g: 255,
    b: 136,
};
const ORANGE: CtColor = CtColor::Rgb {
    r: 255,
    g: 165,
    b: 0,
};
const RED: CtColor = CtColor::Rgb {
    r: 255,
    g: 85,
    b: 85,
};

pub fn print_success(message: &str) {
    println!("{} {}", "✔".with(GREEN).bold(), message);
}

pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".with(ORANGE).bold(), message.with(ORANGE));
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✖".with(RED).bold(), message.with(RED));
}
