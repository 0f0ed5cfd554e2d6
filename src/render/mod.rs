//! Page rendering
//!
//! A [`Renderer`] hands out [`RenderSession`]s, each the equivalent of one
//! browser tab: it loads a page, runs scripts inside it and prints it to a
//! paginated document. Sessions are expensive, so the [`SessionPool`] bounds
//! how many exist and reuses them between export tasks.
//!
//! - [`ChromeRenderer`]: drives headless Chrome/Chromium over the DevTools protocol
//!
//! ## Usage
//!
//! ```no_run
//! use confluence_offline_copy::config::PrintOptions;
//! use confluence_offline_copy::render::{ChromeRenderer, Renderer, SessionPool, resolve_binary};
//! use reqwest::header::HeaderMap;
//! use std::path::Path;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let binary = resolve_binary(None)?;
//! let renderer = Arc::new(ChromeRenderer::launch(binary, Duration::from_secs(120)).await?);
//! let pool = SessionPool::new(Arc::clone(&renderer) as Arc<dyn Renderer>, 2);
//!
//! let mut pooled = pool.checkout().await?;
//! pooled
//!     .session()
//!     .navigate("https://wiki.example.com/display/DOC/Home", &HeaderMap::new())
//!     .await?;
//! pooled
//!     .session()
//!     .print_to_pdf(Path::new("Home.pdf"), &PrintOptions::default())
//!     .await?;
//! pooled.release().await;
//! pool.clear().await;
//! renderer.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod chrome;
mod pool;
mod traits;

pub use chrome::{BROWSER_CANDIDATES, ChromeRenderer, ChromeSession, resolve_binary};
pub use pool::{PooledSession, SessionPool};
pub use traits::{RenderSession, Renderer};
