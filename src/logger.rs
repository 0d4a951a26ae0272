//! Prefixed terminal logging.
//!
//! ```ignore
//! log!("css"; "compiling {}...", name);
//! log!("watch"; "[{}] css rebuilt", logger::timestamp());
//! ```
//!
//! Every line is `[module] message`. The `error` module writes to stderr,
//! all others to stdout.

use colored::{ColoredString, Colorize};
use crossterm::{
    execute,
    terminal::{Clear, ClearType, size},
};
use std::{
    io::{IsTerminal, Write, stderr, stdout},
    sync::OnceLock,
};

/// Columns assumed when the terminal size is unknown (pipes, CI).
const FALLBACK_WIDTH: u16 = 120;

/// Log a message under a module prefix.
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Write one prefixed line.
///
/// Single-line messages are cut to the terminal width; multiline messages
/// (compiler and bundler diagnostics) are printed whole.
pub fn log(module: &str, message: &str) {
    let prefix = styled_prefix(module);
    let message = if message.contains('\n') {
        message
    } else {
        let room = usize::from(terminal_width()).saturating_sub(prefix_width(module));
        fit_width(message, room)
    };

    if module.eq_ignore_ascii_case("error") {
        let mut err = stderr().lock();
        writeln!(err, "{prefix} {message}").ok();
        err.flush().ok();
        return;
    }

    let mut out = stdout().lock();
    if out.is_terminal() {
        // Wipe leftovers of a longer previous line
        execute!(out, Clear(ClearType::UntilNewLine)).ok();
    }
    writeln!(out, "{prefix} {message}").ok();
    out.flush().ok();
}

/// Local wall-clock time as `HH:MM:SS`, for watch-mode rerun lines.
pub fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn terminal_width() -> u16 {
    static WIDTH: OnceLock<u16> = OnceLock::new();
    *WIDTH.get_or_init(|| size().map_or(FALLBACK_WIDTH, |(w, _)| w))
}

/// Columns taken by `[module] `.
const fn prefix_width(module: &str) -> usize {
    module.len() + "[] ".len()
}

/// Pipelines share yellow; the server, watchers and errors stand out.
fn styled_prefix(module: &str) -> ColoredString {
    let prefix = format!("[{module}]");
    match module.to_ascii_lowercase().as_str() {
        "serve" => prefix.bright_blue().bold(),
        "watch" => prefix.bright_green().bold(),
        "error" => prefix.bright_red().bold(),
        _ => prefix.bright_yellow().bold(),
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn fit_width(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let end = (0..=max).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0);
    &s[..end]
}
