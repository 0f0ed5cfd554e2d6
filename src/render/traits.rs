//! Traits for page rendering

use crate::config::PrintOptions;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::path::Path;

/// One rendering context, comparable to a single browser tab
///
/// A session is used by one export task at a time. Calls are strictly
/// sequential: a page is loaded, scripts are run against it, then it is
/// printed.
#[async_trait]
pub trait RenderSession: Send {
    /// Load `url`, sending `headers` with the request
    ///
    /// Navigation has no timeout of its own since wiki pages can be very
    /// large; the caller bounds the whole task instead.
    async fn navigate(&mut self, url: &str, headers: &HeaderMap) -> Result<()>;

    /// Run a script in the context of the loaded page before it is printed
    async fn evaluate(&mut self, script: &str) -> Result<()>;

    /// Print the loaded page to a paginated document at `path`
    async fn print_to_pdf(&mut self, path: &Path, options: &PrintOptions) -> Result<()>;
}

/// Factory for [`RenderSession`]s
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Open a fresh session
    ///
    /// # Errors
    ///
    /// Returns an error if the rendering engine cannot be started.
    async fn new_session(&self) -> Result<Box<dyn RenderSession>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;

    /// Release the rendering engine once no more sessions will be opened
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}
