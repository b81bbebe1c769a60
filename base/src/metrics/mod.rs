//! Process-wide metrics every coordinator binary should expose.

/// The metrics namespace prefix. All metric names start with `{NAMESPACE}_`.
pub const NAMESPACE: &str = "tcc";

mod core;
pub use self::core::*;
