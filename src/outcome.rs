use serde::{Deserialize, Serialize};

/// A target or source path that could not be produced, with the reason
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedEntry {
    pub file: String,
    pub error: String,
}

/// Per-run result of the style pipeline.
///
/// Every source/style pair that reaches the style loop lands in exactly one
/// of the three lists. A download or backup failure lands once, keyed by
/// the path that failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingOutcome {
    pub processed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<FailedEntry>,
}

impl ProcessingOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_processed(&mut self, path: impl Into<String>) {
        self.processed.push(path.into());
    }

    pub fn record_skipped(&mut self, path: impl Into<String>) {
        self.skipped.push(path.into());
    }

    pub fn record_failed(&mut self, file: impl Into<String>, error: impl ToString) {
        self.failed.push(FailedEntry {
            file: file.into(),
            error: error.to_string(),
        });
    }

    pub fn total(&self) -> usize {
        self.processed.len() + self.skipped.len() + self.failed.len()
    }

    /// Append another outcome, keeping each list in order
    pub fn merge(&mut self, other: ProcessingOutcome) {
        self.processed.extend(other.processed);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

/// JSON body returned by the style endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleReport {
    pub status: String,
    pub source: String,
    pub processed: Vec<String>,
    pub failed: Vec<FailedEntry>,
    pub skipped: Vec<String>,
}

impl StyleReport {
    pub fn new(container: &str, source_folder: &str, outcome: ProcessingOutcome) -> Self {
        Self {
            status: "processing".to_string(),
            source: format!("{}/{}", container, source_folder),
            processed: outcome.processed,
            failed: outcome.failed,
            skipped: outcome.skipped,
        }
    }
}
