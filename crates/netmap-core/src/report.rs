//! Per-refresh reporting
//!
//! A refresh reports a summary of skipped and warned items alongside its
//! output: invalid records, skipped plugins, per-plugin failures, names
//! that resolved to nothing. Only a resolution failure prevents output
//! from being produced at all; everything here is informational.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Category of a recorded warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A record value failed validation and was skipped.
    InvalidRecord,
    /// Conflicting facts about one identity; first writer won.
    DuplicateConflict,
    /// A plugin was skipped because a dependency will not run.
    MissingDependency,
    /// A plugin stage handler failed.
    PluginFailure,
    /// A configuration irregularity worth surfacing.
    Config,
}

/// A single recorded warning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    /// Category.
    pub kind: WarningKind,
    /// Human-readable context.
    pub message: String,
}

/// The accumulated data-quality facts of one refresh cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Report {
    /// Recorded warnings, in occurrence order.
    pub warnings: Vec<Warning>,

    /// Domains whose records resolved to no address at all. A candidate
    /// list for a dangling-record report, not an error.
    pub dangling_domains: Vec<String>,

    /// Domains that resolved to more than one node.
    pub multi_homed_domains: Vec<String>,

    /// Placeholder nodes synthesized by the resolution pass.
    pub placeholders_created: usize,
}

impl Report {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning.
    pub fn warn(&mut self, kind: WarningKind, message: impl Into<String>) {
        let message = message.into();
        warn!("{message}");
        self.warnings.push(Warning { kind, message });
    }

    /// Record a skipped record value.
    pub fn invalid_record(&mut self, context: &str, value: &str, detail: impl std::fmt::Display) {
        self.warn(
            WarningKind::InvalidRecord,
            format!("skipped record '{value}' on {context}: {detail}"),
        );
    }

    /// Record a name that resolved to nothing.
    pub fn dangling(&mut self, name: impl Into<String>) {
        self.dangling_domains.push(name.into());
    }

    /// Number of warnings of one kind.
    pub fn count(&self, kind: WarningKind) -> usize {
        self.warnings.iter().filter(|w| w.kind == kind).count()
    }

    /// Log a one-line summary of this report.
    pub fn log_summary(&self) {
        info!(
            warnings = self.warnings.len(),
            dangling = self.dangling_domains.len(),
            multi_homed = self.multi_homed_domains.len(),
            placeholders = self.placeholders_created,
            "refresh report"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_kind() {
        let mut report = Report::new();
        report.warn(WarningKind::InvalidRecord, "one");
        report.warn(WarningKind::PluginFailure, "two");
        report.invalid_record("a.example.com", "not-an-ip", "invalid IPv4 address");

        assert_eq!(report.count(WarningKind::InvalidRecord), 2);
        assert_eq!(report.count(WarningKind::PluginFailure), 1);
        assert_eq!(report.count(WarningKind::MissingDependency), 0);
    }
}
