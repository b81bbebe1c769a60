//! A single-line `eyre` report hook, so errors fit naturally as one log line instead of a
//! multi-line blob when a structured log pipeline captures them.

mod handler;

pub use handler::HookBuilder;

/// Install the single-line error hook as the global `eyre` report hook, with defaults
/// suited to a long-running service (backtraces captured only when `RUST_BACKTRACE` is set).
pub fn install() -> eyre::Result<()> {
    HookBuilder::default().install()
}
