//! Output formatter trait

use crate::output::report::CouncilReport;

/// Trait for formatting council reports
pub trait OutputFormatter {
    /// Format the complete report
    fn format(&self, report: &CouncilReport) -> String;

    /// Format as JSON
    fn format_json(&self, report: &CouncilReport) -> String;
}
