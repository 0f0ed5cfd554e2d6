//! Export of a single page: rendered document plus attachments

use crate::api::ApiClient;
use crate::config::PrintOptions;
use crate::error::Result;
use crate::render::RenderSession;
use crate::sanitize::{file_name, sanitize};
use crate::types::ExportTarget;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

/// Opens every "UI Expand" macro so collapsed content ends up in the document
pub const EXPAND_MACROS_SCRIPT: &str = "document.querySelectorAll('.rwui_expand').forEach(function (el) { \
var parent = el.parentElement; \
if (parent) { parent.classList.add('rw_open'); parent.classList.remove('rw_active'); } });";

/// What a successful export wrote
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedPage {
    /// Rendered document
    pub document: PathBuf,
    /// Number of attachments written next to it
    pub attachments: usize,
}

/// Work performed for each [`ExportTarget`] while holding a renderer session
#[async_trait]
pub trait ExportRunner: Send + Sync {
    /// Export `target` using `session`
    ///
    /// # Errors
    ///
    /// Returns the error of the first step that failed; the caller isolates
    /// it from other tasks.
    async fn export(
        &self,
        target: &ExportTarget,
        session: &mut dyn RenderSession,
    ) -> Result<ExportedPage>;
}

/// Production [`ExportRunner`]: renders through the session and downloads
/// attachments through the API client
pub struct PageExporter {
    client: ApiClient,
    print: PrintOptions,
}

impl PageExporter {
    /// Create an exporter for one source
    pub fn new(client: ApiClient, print: PrintOptions) -> Self {
        Self { client, print }
    }
}

#[async_trait]
impl ExportRunner for PageExporter {
    async fn export(
        &self,
        target: &ExportTarget,
        session: &mut dyn RenderSession,
    ) -> Result<ExportedPage> {
        let item = &target.item;
        info!(title = %item.title, dest = ?target.dest_dir, "exporting page");

        tokio::fs::create_dir_all(&target.dest_dir).await?;

        let page_url = self.client.url(&item.page_url)?;
        session
            .navigate(page_url.as_str(), self.client.headers())
            .await?;
        session.evaluate(EXPAND_MACROS_SCRIPT).await?;

        let document = target.dest_dir.join(file_name(&item.title, "pdf"));
        session.print_to_pdf(&document, &self.print).await?;
        debug!(title = %item.title, ?document, "document written");

        let attachments = self.client.list_attachments(item).await?;
        if !attachments.is_empty() {
            info!(title = %item.title, count = attachments.len(), "exporting attachments");
        }
        for attachment in &attachments {
            let dest = target.dest_dir.join(sanitize(&attachment.title));
            let bytes = self.client.download(&attachment.download_url, &dest).await?;
            debug!(attachment = %attachment.title, bytes, "attachment written");
        }

        Ok(ExportedPage {
            document,
            attachments: attachments.len(),
        })
    }
}
