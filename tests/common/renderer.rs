//! Browser-free renderer that writes a stub document on print

use async_trait::async_trait;
use confluence_offline_copy::{PrintOptions, RenderSession, Renderer, Result};
use reqwest::header::HeaderMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Content of every document the stub renderer prints
pub const STUB_PDF: &[u8] = b"%PDF-1.4\n% stub\n";

/// Shared record of what the stub sessions did
#[derive(Default)]
pub struct RenderLog {
    /// Sessions opened
    pub sessions: AtomicUsize,
    /// URLs navigated to, in call order
    pub navigated: Mutex<Vec<String>>,
    /// Documents printed
    pub printed: AtomicUsize,
}

/// [`Renderer`] producing [`StubSession`]s
pub struct StubRenderer {
    pub log: Arc<RenderLog>,
}

impl StubRenderer {
    pub fn new() -> (Arc<Self>, Arc<RenderLog>) {
        let log = Arc::new(RenderLog::default());
        (
            Arc::new(Self {
                log: Arc::clone(&log),
            }),
            log,
        )
    }
}

#[async_trait]
impl Renderer for StubRenderer {
    async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
        self.log.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StubSession {
            log: Arc::clone(&self.log),
            loaded: false,
        }))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

pub struct StubSession {
    log: Arc<RenderLog>,
    loaded: bool,
}

#[async_trait]
impl RenderSession for StubSession {
    async fn navigate(&mut self, url: &str, _headers: &HeaderMap) -> Result<()> {
        self.log
            .navigated
            .lock()
            .unwrap()
            .push(url.to_string());
        self.loaded = true;
        Ok(())
    }

    async fn evaluate(&mut self, _script: &str) -> Result<()> {
        Ok(())
    }

    async fn print_to_pdf(&mut self, path: &Path, _options: &PrintOptions) -> Result<()> {
        assert!(self.loaded, "print before navigate");
        tokio::fs::write(path, STUB_PDF).await?;
        self.log.printed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
