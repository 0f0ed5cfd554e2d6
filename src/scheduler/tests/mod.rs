use super::*;
use crate::config::PrintOptions;
use crate::error::{Error, Result};
use crate::export::ExportedPage;
use crate::render::{RenderSession, Renderer};
use crate::types::ContentItem;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks how many sessions exist at once
#[derive(Default)]
struct Gauge {
    created: AtomicUsize,
    live: AtomicUsize,
    peak_live: AtomicUsize,
}

struct GaugedSession {
    gauge: Arc<Gauge>,
}

impl Drop for GaugedSession {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RenderSession for GaugedSession {
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

struct GaugedRenderer {
    gauge: Arc<Gauge>,
}

#[async_trait]
impl Renderer for GaugedRenderer {
    async fn new_session(&self) -> Result<Box<dyn RenderSession>> {
        self.gauge.created.fetch_add(1, Ordering::SeqCst);
        let live = self.gauge.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(GaugedSession {
            gauge: Arc::clone(&self.gauge),
        }))
    }

    fn name(&self) -> &'static str {
        "gauged"
    }
}

/// Behaves according to the target title: "fail", "hang", "panic" or succeed
#[derive(Default)]
struct ScriptedRunner {
    active: AtomicUsize,
    peak_active: AtomicUsize,
    finished: AtomicUsize,
}

#[async_trait]
impl ExportRunner for ScriptedRunner {
    async fn export(
        &self,
        target: &ExportTarget,
        session: &mut dyn RenderSession,
    ) -> Result<ExportedPage> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_active.fetch_max(active, Ordering::SeqCst);

        session.navigate("about:blank", &HeaderMap::new()).await?;
        let result = match target.item.title.as_str() {
            "fail" => Err(Error::Other("server said no".into())),
            "hang" => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Err(Error::Other("unreachable".into()))
            }
            "panic" => panic!("renderer crashed"),
            _ => {
                tokio::time::sleep(Duration::from_millis(15)).await;
                Ok(ExportedPage {
                    document: target.dest_dir.join("page.pdf"),
                    attachments: 1,
                })
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.finished.fetch_add(1, Ordering::SeqCst);
        result
    }
}

fn target(title: &str) -> ExportTarget {
    ExportTarget {
        item: ContentItem {
            title: title.to_string(),
            id: title.to_string(),
            space: "SP".into(),
            page_url: format!("/display/SP/{title}"),
            attachments_url: format!("/rest/api/content/{title}/child/attachment"),
        },
        ancestor: None,
        dest_dir: PathBuf::from("/tmp/snapshots/SP").join(title),
    }
}

fn setup(size: usize) -> (Arc<Gauge>, Arc<SessionPool>, Arc<ScriptedRunner>) {
    let gauge = Arc::new(Gauge::default());
    let renderer = Arc::new(GaugedRenderer {
        gauge: Arc::clone(&gauge),
    });
    let pool = SessionPool::new(renderer, size);
    (gauge, pool, Arc::new(ScriptedRunner::default()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn never_exceeds_the_session_limit() {
    let (gauge, pool, runner) = setup(3);
    let targets: Vec<_> = (0..20).map(|i| target(&format!("page-{i}"))).collect();

    let summary = run(targets, pool, runner.clone(), Duration::from_secs(5)).await;

    assert_eq!(summary.settled(), 20);
    assert_eq!(summary.exported, 20);
    assert_eq!(summary.attachments, 20);
    assert!(runner.peak_active.load(Ordering::SeqCst) <= 3);
    assert!(gauge.peak_live.load(Ordering::SeqCst) <= 3);
    assert!(gauge.created.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn idle_waits_for_every_queued_task() {
    let (_gauge, pool, runner) = setup(2);
    let scheduler = Scheduler::start(pool, runner.clone(), Duration::from_secs(5));

    for i in 0..7 {
        scheduler.queue(target(&format!("page-{i}")));
    }
    let summary = scheduler.idle().await;

    assert_eq!(runner.finished.load(Ordering::SeqCst), 7);
    assert_eq!(runner.active.load(Ordering::SeqCst), 0);
    assert_eq!(summary.exported, 7);
}

#[tokio::test]
async fn failing_task_does_not_affect_the_others() {
    let (gauge, pool, runner) = setup(3);
    let mut targets: Vec<_> = (0..19).map(|i| target(&format!("page-{i}"))).collect();
    targets.insert(7, target("fail"));

    let summary = run(targets, pool, runner, Duration::from_secs(5)).await;

    assert_eq!(summary.exported, 19);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].title, "fail");
    assert!(summary.failed[0].reason.contains("server said no"));
    // An ordinary error leaves the session usable
    assert!(gauge.created.load(Ordering::SeqCst) <= 3);
}

#[tokio::test]
async fn timed_out_task_is_aborted_and_its_session_replaced() {
    let (gauge, pool, runner) = setup(1);
    let targets = vec![target("hang"), target("after-hang")];

    let started = std::time::Instant::now();
    let summary = run(targets, Arc::clone(&pool), runner, Duration::from_millis(100)).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(summary.exported, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].title, "hang");
    assert_eq!(summary.failed[0].reason, "timed out");
    assert_eq!(gauge.created.load(Ordering::SeqCst), 2);
    // The replacement is parked in the pool; the hung one is gone
    assert_eq!(gauge.live.load(Ordering::SeqCst), 1);
    assert_eq!(pool.idle_count().await, 1);
}

#[tokio::test]
async fn panicking_task_is_recorded_as_failed() {
    let (gauge, pool, runner) = setup(2);
    let targets = vec![target("panic"), target("a"), target("b")];

    let summary = run(targets, pool, runner, Duration::from_secs(5)).await;

    assert_eq!(summary.exported, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].title, "panic");
    assert!(gauge.live.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn empty_queue_settles_immediately() {
    let (gauge, pool, runner) = setup(2);
    let summary = run(Vec::new(), pool, runner, Duration::from_secs(5)).await;

    assert_eq!(summary, RunSummary::default());
    assert_eq!(gauge.created.load(Ordering::SeqCst), 0);
}
