//! Shared types for sentry-sourcemaps.
//!
//! The data model used by the upload pipeline (package references, upload
//! targets, per-file outcomes, run summaries) and the registry documents it
//! consumes. Kept free of I/O so both the core library and the CLI can depend
//! on it.

pub mod registry;
pub mod types;

// Re-exports
pub use registry::{Dist, Integrity, Packument, ResolveError, VersionManifest};
pub use types::*;

/// Name under which the tool identifies itself (temp dirs, user agent).
pub const PROGRAM_NAME: &str = "sentry-sourcemaps";

/// Glob pattern selecting source maps when none is configured.
pub const DEFAULT_MAP_PATTERN: &str = "**/*.map";

/// Glob pattern selecting JavaScript sources when sources are included.
pub const SOURCE_PATTERN: &str = "**/*.js";

/// Prefix stripped from package paths when none is configured.
pub const DEFAULT_STRIP_PREFIX: &str = "dist";
