pub mod extract;
pub mod mapper;
pub mod npmrc;
pub mod orchestrator;
pub mod publish;
pub mod registry;
pub mod tracker;

pub mod reporter;

pub use orchestrator::{Orchestrator, UploadConfig, UploadPlan};
pub use publish::{PublishConfig, PublishError, PublishReport, publish};
pub use reporter::{NullReporter, Reporter};

/// User Agent string for registry and tracker requests
pub const USER_AGENT: &str = concat!("sentry-sourcemaps/", env!("CARGO_PKG_VERSION"));
