//! Terminal output: theme and the progress reporter.

pub mod reporter;
pub mod theme;

pub use reporter::TerminalReporter;
pub use theme::Theme;
