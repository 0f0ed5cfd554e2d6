//! Headless Chrome/Chromium renderer driven over the DevTools protocol

use super::traits::{RenderSession, Renderer};
use crate::config::PrintOptions;
use crate::error::{Error, RenderError, Result};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{Headers, SetExtraHttpHeadersParams};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use reqwest::header::HeaderMap;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Binary names searched on PATH, in order
pub const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
];

/// Find the browser binary to launch
///
/// A configured path must exist; otherwise each of [`BROWSER_CANDIDATES`] is
/// looked up on PATH with the `which` crate.
///
/// # Errors
///
/// Returns [`RenderError::BrowserNotFound`] if the configured binary does not
/// exist, or if nothing is configured and no candidate is on PATH.
pub fn resolve_binary(configured: Option<&Path>) -> Result<PathBuf> {
    match configured {
        Some(path) if path.is_file() => Ok(path.to_path_buf()),
        Some(path) => Err(RenderError::BrowserNotFound {
            searched: path.display().to_string(),
        }
        .into()),
        None => BROWSER_CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .ok_or_else(|| {
                RenderError::BrowserNotFound {
                    searched: BROWSER_CANDIDATES.join(", "),
                }
                .into()
            }),
    }
}

/// Renderer backed by one headless Chrome/Chromium process
///
/// Every session is a tab of the same browser. Pages are loaded by the
/// browser itself, so the extra headers given to
/// [`RenderSession::navigate`] also reach images, stylesheets and scripts
/// the page pulls in.
///
/// # Examples
///
/// ```no_run
/// use confluence_offline_copy::render::{ChromeRenderer, Renderer, resolve_binary};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let binary = resolve_binary(None)?;
/// let renderer = ChromeRenderer::launch(binary, Duration::from_secs(120)).await?;
/// // ... open sessions ...
/// renderer.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct ChromeRenderer {
    binary_path: PathBuf,
    browser: Mutex<Browser>,
    handler: JoinHandle<()>,
    _profile: TempDir,
}

impl ChromeRenderer {
    /// Start a headless browser from `binary_path`
    ///
    /// `request_timeout` bounds every single protocol call, page loads and
    /// printing included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExternalTool`] if the browser cannot be started.
    pub async fn launch(binary_path: PathBuf, request_timeout: Duration) -> Result<Self> {
        let profile = tempfile::Builder::new()
            .prefix("confluence-chrome-")
            .tempdir()?;

        let config = BrowserConfig::builder()
            .chrome_executable(&binary_path)
            .user_data_dir(profile.path())
            .no_sandbox()
            .arg("--disable-gpu")
            .request_timeout(request_timeout)
            .build()
            .map_err(|e| Error::ExternalTool(format!("invalid browser configuration: {}", e)))?;

        let (browser, mut events) = Browser::launch(config).await.map_err(|e| {
            Error::ExternalTool(format!(
                "Failed to launch {}: {}",
                binary_path.display(),
                e
            ))
        })?;

        // The protocol connection only makes progress while its handler is polled
        let handler = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser protocol event failed");
                }
            }
        });

        debug!(browser = ?binary_path, "headless browser started");
        Ok(Self {
            binary_path,
            browser: Mutex::new(browser),
            handler,
            _profile: profile,
        })
    }

    /// Binary this renderer launched
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| Error::ExternalTool(format!("Failed to open browser tab: {}", e)))?;

        Ok(Box::new(ChromeSession {
            page: Some(page),
            loaded: false,
        }))
    }

    fn name(&self) -> &'static str {
        "headless-chrome"
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await;
        let _ = browser.wait().await;
        self.handler.abort();

        closed
            .map(|_| ())
            .map_err(|e| Error::ExternalTool(format!("Failed to close browser: {}", e)))
    }
}

/// One browser tab
///
/// The tab is closed when the session is dropped, including when its task
/// is aborted midway.
pub struct ChromeSession {
    page: Option<Page>,
    loaded: bool,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| Error::ExternalTool("browser tab already closed".to_string()))
    }

    fn loaded_page(&self) -> Result<&Page> {
        if !self.loaded {
            return Err(RenderError::NoPageLoaded.into());
        }
        self.page()
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    debug!(error = %e, "failed to close browser tab");
                }
            });
        }
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn navigate(&mut self, url: &str, headers: &HeaderMap) -> Result<()> {
        let navigation = |reason: String| RenderError::Navigation {
            url: url.to_string(),
            reason,
        };

        self.loaded = false;
        let page = self.page()?;

        let extra = header_object(headers).map_err(navigation)?;
        page.execute(SetExtraHttpHeadersParams::new(Headers::new(extra)))
            .await
            .map_err(|e| navigation(e.to_string()))?;
        page.goto(url).await.map_err(|e| navigation(e.to_string()))?;

        debug!(url, "page loaded");
        self.loaded = true;
        Ok(())
    }

    async fn evaluate(&mut self, script: &str) -> Result<()> {
        self.loaded_page()?
            .evaluate(script)
            .await
            .map_err(|e| RenderError::Script {
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn print_to_pdf(&mut self, path: &Path, options: &PrintOptions) -> Result<()> {
        let page = self.loaded_page()?;
        let params = pdf_params(options)?;

        let document = page.pdf(params).await.map_err(|e| RenderError::Print {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if document.is_empty() {
            warn!(?path, "browser returned an empty document");
        }

        tokio::fs::write(path, document).await?;
        Ok(())
    }
}

/// Headers as the JSON object the protocol expects; repeated names are joined
fn header_object(headers: &HeaderMap) -> std::result::Result<Value, String> {
    let mut object = Map::new();
    for (name, value) in headers {
        let value = value
            .to_str()
            .map_err(|_| format!("header {} is not valid text", name))?;
        match object.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                object.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
    }
    Ok(Value::Object(object))
}

/// Print parameters for the configured paper size and uniform margin
fn pdf_params(options: &PrintOptions) -> Result<PrintToPdfParams> {
    let (width, height) = options.paper_size_inches()?;
    let margin = options.margin_inches()?;

    Ok(PrintToPdfParams {
        paper_width: Some(width),
        paper_height: Some(height),
        margin_top: Some(margin),
        margin_bottom: Some(margin),
        margin_left: Some(margin),
        margin_right: Some(margin),
        ..Default::default()
    })
}
