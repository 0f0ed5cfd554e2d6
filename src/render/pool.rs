//! Bounded pool of renderer sessions with checkout/return semantics

use super::traits::{RenderSession, Renderer};
use crate::error::Result;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A fixed-size pool of [`RenderSession`]s
///
/// At most `size` sessions exist at any time: every live session is either
/// idle in the pool or held by exactly one [`PooledSession`]. Sessions are
/// created lazily on first checkout.
///
/// Waiters are served in arrival order.
pub struct SessionPool {
    renderer: Arc<dyn Renderer>,
    idle: Mutex<Vec<Box<dyn RenderSession>>>,
    slots: Arc<Semaphore>,
    size: usize,
}

/// A session checked out of a [`SessionPool`]
///
/// Call [`release`](PooledSession::release) to hand a healthy session back.
/// Dropping the guard instead (timeout, panic) discards the session and frees
/// its slot, so the next checkout starts from a fresh one.
pub struct PooledSession {
    session: Box<dyn RenderSession>,
    pool: Arc<SessionPool>,
    _permit: OwnedSemaphorePermit,
}

impl SessionPool {
    /// Create a pool holding at most `size` sessions (minimum 1)
    pub fn new(renderer: Arc<dyn Renderer>, size: usize) -> Arc<Self> {
        let size = size.max(1);
        Arc::new(Self {
            renderer,
            idle: Mutex::new(Vec::with_capacity(size)),
            slots: Arc::new(Semaphore::new(size)),
            size,
        })
    }

    /// Maximum number of sessions
    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots not currently checked out
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Wait for a free slot and take a session, reusing an idle one if possible
    ///
    /// # Errors
    ///
    /// Returns an error if a new session has to be created and the renderer
    /// fails to start it. The slot is freed again in that case.
    pub async fn checkout(self: &Arc<Self>) -> Result<PooledSession> {
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| crate::error::Error::Other("session pool closed".to_string()))?;

        let reused = self.idle.lock().await.pop();
        let session = match reused {
            Some(session) => session,
            None => {
                debug!(renderer = self.renderer.name(), "opening renderer session");
                self.renderer.new_session().await?
            }
        };

        Ok(PooledSession {
            session,
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    /// Drop every idle session
    pub async fn clear(&self) {
        let drained = std::mem::take(&mut *self.idle.lock().await);
        debug!(sessions = drained.len(), "closing idle renderer sessions");
    }

    #[cfg(test)]
    pub(crate) async fn idle_count(&self) -> usize {
        self.idle.lock().await.len()
    }
}

impl PooledSession {
    /// The checked-out session
    pub fn session(&mut self) -> &mut dyn RenderSession {
        self.session.as_mut()
    }

    /// Return the session to the pool for reuse
    pub async fn release(self) {
        let PooledSession {
            session,
            pool,
            _permit,
        } = self;
        // Park the session before the slot frees so the next waiter reuses it
        pool.idle.lock().await.push(session);
        drop(_permit);
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PrintOptions;
    use crate::error::Error;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullSession;

    #[async_trait]
    impl RenderSession for NullSession {
        async fn navigate(&mut self, _url: &str, _headers: &HeaderMap) -> Result<()> {
            Ok(())
        }
        async fn evaluate(&mut self, _script: &str) -> Result<()> {
            Ok(())
        }
        async fn print_to_pdf(&mut self, _path: &Path, _options: &PrintOptions) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        created: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Renderer for CountingRenderer {
        async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
            if self.fail {
                return Err(Error::ExternalTool("browser failed to start".into()));
            }
            self.created.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(NullSession))
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn released_sessions_are_reused() {
        let renderer = Arc::new(CountingRenderer::default());
        let pool = SessionPool::new(renderer.clone(), 2);

        let first = pool.checkout().await.unwrap();
        first.release().await;
        let second = pool.checkout().await.unwrap();
        second.release().await;

        assert_eq!(renderer.created.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle_count().await, 1);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn dropped_sessions_are_discarded_and_replaced() {
        let renderer = Arc::new(CountingRenderer::default());
        let pool = SessionPool::new(renderer.clone(), 1);

        let abandoned = pool.checkout().await.unwrap();
        assert_eq!(pool.available(), 0);
        drop(abandoned);
        assert_eq!(pool.available(), 1, "slot is freed on drop");
        assert_eq!(pool.idle_count().await, 0, "session is not returned");

        let fresh = pool.checkout().await.unwrap();
        fresh.release().await;
        assert_eq!(renderer.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn checkout_waits_for_a_free_slot() {
        let pool = SessionPool::new(Arc::new(CountingRenderer::default()), 1);
        let held = pool.checkout().await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), pool.checkout()).await;
        assert!(waiting.is_err(), "second checkout must block while the slot is held");

        held.release().await;
        let next = tokio::time::timeout(Duration::from_secs(1), pool.checkout()).await;
        assert!(next.unwrap().is_ok());
    }

    #[tokio::test]
    async fn failed_session_creation_frees_the_slot() {
        let renderer = Arc::new(CountingRenderer {
            fail: true,
            ..Default::default()
        });
        let pool = SessionPool::new(renderer, 1);

        assert!(pool.checkout().await.is_err());
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn zero_size_is_clamped_to_one() {
        let pool = SessionPool::new(Arc::new(CountingRenderer::default()), 0);
        assert_eq!(pool.size(), 1);
        pool.clear().await;
    }
}
