//! Core types for confluence-offline-copy

use std::path::PathBuf;

/// One page discovered through the search API
///
/// Immutable once fetched. `title` is a display string and must go through
/// [`sanitize`](crate::sanitize::sanitize) before it is used in a path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentItem {
    /// Display title
    pub title: String,
    /// Content identifier
    pub id: String,
    /// Space key the page lives in
    pub space: String,
    /// Rendered page URL, relative to the base URL
    pub page_url: String,
    /// Attachment collection URL, relative to the base URL
    pub attachments_url: String,
}

/// A downloadable file attached to a [`ContentItem`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentRef {
    /// File name as stored in the wiki (untrusted)
    pub title: String,
    /// Download URL, relative to the base URL
    pub download_url: String,
}

/// A discovered page paired with the directory it is exported into
///
/// Consumed exactly once by the [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportTarget {
    /// Page to export
    pub item: ContentItem,
    /// Title of the tree root this page was discovered under, if any
    pub ancestor: Option<String>,
    /// Sanitized destination directory
    pub dest_dir: PathBuf,
}

/// How a single export task settled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportOutcome {
    /// Document and every attachment were written
    Exported {
        /// Rendered document path
        document: PathBuf,
        /// Number of attachments written next to it
        attachments: usize,
    },
    /// A step failed; siblings kept running
    Failed {
        /// Error message of the failing step
        reason: String,
    },
    /// The task exceeded its wall-clock ceiling and was aborted
    TimedOut,
}

impl ExportOutcome {
    /// Whether the task produced its document and attachments
    pub fn is_success(&self) -> bool {
        matches!(self, ExportOutcome::Exported { .. })
    }
}

/// A target that did not export, kept for the end-of-run report
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FailedExport {
    /// Page title
    pub title: String,
    /// Destination directory the export was meant for
    pub dest_dir: PathBuf,
    /// Why it failed
    pub reason: String,
}

/// Aggregate result of one snapshot run for one source
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Tasks that exported successfully
    pub exported: usize,
    /// Attachments written across all successful tasks
    pub attachments: usize,
    /// Tasks that failed or timed out
    pub failed: Vec<FailedExport>,
    /// Searches that failed outright, leaving their results unknown
    pub discovery_errors: Vec<String>,
}

impl RunSummary {
    /// Total number of settled export tasks
    pub fn settled(&self) -> usize {
        self.exported + self.failed.len()
    }

    /// Record one settled task
    pub fn record(&mut self, target: &ExportTarget, outcome: ExportOutcome) {
        match outcome {
            ExportOutcome::Exported { attachments, .. } => {
                self.exported += 1;
                self.attachments += attachments;
            }
            ExportOutcome::Failed { reason } => self.failed.push(FailedExport {
                title: target.item.title.clone(),
                dest_dir: target.dest_dir.clone(),
                reason,
            }),
            ExportOutcome::TimedOut => self.failed.push(FailedExport {
                title: target.item.title.clone(),
                dest_dir: target.dest_dir.clone(),
                reason: "timed out".to_string(),
            }),
        }
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: RunSummary) {
        self.exported += other.exported;
        self.attachments += other.attachments;
        self.failed.extend(other.failed);
        self.discovery_errors.extend(other.discovery_errors);
    }
}
