//! Status lines on stderr.

use owo_colors::OwoColorize;

pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

pub fn info(message: &str) {
    eprintln!("{} {}", "ℹ".blue().bold(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
}

pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Human readable byte size, e.g. `12.3 kB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["kB", "MB", "GB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64 / 1000.0;
    let mut unit = 0;
    while size >= 1000.0 && unit + 1 < UNITS.len() {
        size /= 1000.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}

/// Two-column table of paths and sizes, paths left-aligned.
pub fn format_table(rows: &[(String, u64)]) -> String {
    let width = rows.iter().map(|(path, _)| path.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(path, bytes)| format!("  {path:<width$}  {}", format_size(*bytes)))
        .collect::<Vec<_>>()
        .join("\n")
}
