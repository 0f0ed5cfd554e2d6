//! # confluence-offline-copy
//!
//! Archives Confluence pages into dated offline snapshots.
//!
//! ## Design Philosophy
//!
//! Each configured source is processed as one pipeline:
//! - **Discover** - pages carrying a label are exported on their own; pages
//!   carrying the tree label are exported together with their direct children
//! - **Export** - every page is rendered to a PDF through a pool of headless
//!   browser sessions and its attachments are downloaded next to it
//! - **Sweep** - snapshot directories older than the retention window are
//!   removed
//!
//! Output layout: `OUTPUT_DIR/<YYYY-MM-DD>/<space>/[<tree root>/]<title>/`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use confluence_offline_copy::{ConfigFile, orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigFile::load(&ConfigFile::default_path()).await?;
//!     let sources = config.sources()?;
//!
//!     let summary = orchestrator::run_all(&sources).await;
//!     println!("{} pages exported", summary.exported);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Search and content REST API client
pub mod api;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Single page export
pub mod export;
/// Source run sequencing
pub mod orchestrator;
/// Document rendering through headless browser sessions
pub mod render;
/// Snapshot retention
pub mod retention;
/// Retry logic with exponential backoff
pub mod retry;
/// Filesystem-safe names
pub mod sanitize;
/// Bounded-concurrency export scheduling
pub mod scheduler;
/// Page tree expansion
pub mod tree;
/// Core types
pub mod types;

// Re-export commonly used types
pub use api::ApiClient;
pub use config::{ConfigFile, PrintOptions, RetryConfig, SourceConfig, SourceOptions};
pub use error::{Error, RenderError, Result};
pub use export::{ExportRunner, ExportedPage, PageExporter};
pub use render::{ChromeRenderer, RenderSession, Renderer, SessionPool, resolve_binary};
pub use retention::{PruneReport, prune, prune_expired_snapshots};
pub use sanitize::sanitize;
pub use scheduler::Scheduler;
pub use types::{
    AttachmentRef, ContentItem, ExportOutcome, ExportTarget, FailedExport, RunSummary,
};
