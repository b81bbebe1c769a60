//! Helpers for formatting a [`backtrace::Backtrace`] onto a single line, so it can sit
//! alongside the rest of an error report in structured log output without a multi-line blob.

use std::fmt;

use backtrace::{Backtrace, BacktraceFrame};

/// Write `backtrace` into `f` as a single line, joining frames with `separator`.
///
/// Frames without resolved symbols (no debug info available) are skipped. By default, file
/// paths are printed relative-looking (just the file name); pass `show_full_paths` to print
/// the full path as recorded by the backtrace.
pub fn fmt_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    separator: &str,
    show_full_paths: bool,
) -> fmt::Result {
    for (n, frame) in backtrace.frames().iter().enumerate() {
        for symbol in frame.symbols() {
            let name = symbol
                .name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| "<unresolved>".to_string());
            write!(f, "{separator}{n}: {name}")?;

            if let Some(file) = symbol.filename() {
                let file = if show_full_paths {
                    file.display().to_string()
                } else {
                    file.file_name()
                        .map(|f| f.to_string_lossy().to_string())
                        .unwrap_or_else(|| file.display().to_string())
                };
                match symbol.lineno() {
                    Some(line) => write!(f, " at {file}:{line}")?,
                    None => write!(f, " at {file}")?,
                }
            }
        }
    }
    Ok(())
}

/// Returns true if a frame carries no resolved symbols, i.e. it came from a stripped binary.
pub fn is_unresolved(frame: &BacktraceFrame) -> bool {
    frame.symbols().is_empty()
}
