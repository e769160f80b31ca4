//! One-line status messages on stderr.

use owo_colors::{OwoColorize, Stream, Style};

fn symbol(symbol: &str, style: Style) -> String {
    symbol
        .if_supports_color(Stream::Stderr, |s| s.style(style))
        .to_string()
}

pub fn success(message: &str) {
    eprintln!("{} {}", symbol("✓", Style::new().green().bold()), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", symbol("ℹ", Style::new().blue().bold()), message);
}

pub fn warning(message: &str) {
    eprintln!(
        "{} {}",
        symbol("⚠", Style::new().yellow().bold()),
        message.if_supports_color(Stream::Stderr, |m| m.yellow())
    );
}

pub fn error(message: &str) {
    eprintln!(
        "{} {}",
        symbol("✗", Style::new().red().bold()),
        message.if_supports_color(Stream::Stderr, |m| m.red())
    );
}
