// ABOUTME: Crate version and default CLI constants

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Filename the reference driver reads from when no path is given on the
/// command line (spec §6).
pub const DEFAULT_SCRIPT_FILENAME: &str = "code.lang";
