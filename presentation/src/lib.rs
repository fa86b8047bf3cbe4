//! Presentation layer for review-council
//!
//! This crate contains CLI definitions, the live progress reporters
//! and the final report formatters.

pub mod cli;
pub mod output;
pub mod progress;

// Re-export commonly used types
pub use cli::commands::{AgentsArgs, Cli, Command, ReportFormat, RunArgs};
pub use output::console::ConsoleFormatter;
pub use output::formatter::OutputFormatter;
pub use output::report::{AgentSummary, CouncilReport};
pub use progress::reporter::{
    CouncilObserver, ProgressReporter, SimpleProgress, activity_sink, follow_events,
};
