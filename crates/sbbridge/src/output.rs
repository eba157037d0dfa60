//! Table rendering for the informational commands.

use std::io::{self, Write};

use tabled::{Table, Tabled, settings::Style};

pub fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

/// Human-friendly duration (`5m`, `1s 500ms`).
pub fn duration(d: std::time::Duration) -> String {
    humantime::format_duration(d).to_string()
}
