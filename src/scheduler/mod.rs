//! Bounded-concurrency export scheduler
//!
//! Targets are queued without blocking the caller. A dispatcher takes them in
//! arrival order, waits for a renderer session from the [`SessionPool`] and
//! only then spawns the export task, so no more than `pool.size()` tasks ever
//! run at once. Any free slot picks up the next target; completion order is
//! not guaranteed to match arrival order.
//!
//! Every task is isolated: errors and panics are caught at the task boundary
//! and recorded, and a task exceeding its time ceiling is aborted and its
//! session discarded rather than returned to the pool.
//!
//! # Example
//!
//! ```no_run
//! # use confluence_offline_copy::export::ExportRunner;
//! # use confluence_offline_copy::render::SessionPool;
//! # use confluence_offline_copy::scheduler::Scheduler;
//! # use confluence_offline_copy::types::ExportTarget;
//! # use std::sync::Arc;
//! # use std::time::Duration;
//! # async fn example(pool: Arc<SessionPool>, runner: Arc<dyn ExportRunner>, targets: Vec<ExportTarget>) {
//! let scheduler = Scheduler::start(pool, runner, Duration::from_secs(120));
//! for target in targets {
//!     scheduler.queue(target);
//! }
//! let summary = scheduler.idle().await;
//! println!("{} exported, {} failed", summary.exported, summary.failed.len());
//! # }
//! ```

use crate::error::Error;
use crate::export::ExportRunner;
use crate::render::{PooledSession, SessionPool};
use crate::types::{ExportOutcome, ExportTarget, RunSummary};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, error, info, info_span, warn};

/// Accepts export targets and runs them with bounded concurrency
pub struct Scheduler {
    sender: mpsc::UnboundedSender<ExportTarget>,
    dispatcher: JoinHandle<RunSummary>,
}

impl Scheduler {
    /// Spawn the dispatcher
    ///
    /// # Arguments
    ///
    /// * `pool` - Renderer sessions; its size is the concurrency limit
    /// * `runner` - Work performed per target
    /// * `task_timeout` - Wall-clock ceiling for a single task
    pub fn start(
        pool: Arc<SessionPool>,
        runner: Arc<dyn ExportRunner>,
        task_timeout: Duration,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(receiver, pool, runner, task_timeout));
        Self { sender, dispatcher }
    }

    /// Queue a target; returns immediately
    pub fn queue(&self, target: ExportTarget) {
        if let Err(rejected) = self.sender.send(target) {
            // Only possible if the dispatcher itself died
            error!(title = %rejected.0.item.title, "scheduler is not accepting targets");
        }
    }

    /// Stop accepting targets and wait until every queued task has settled
    pub async fn idle(self) -> RunSummary {
        let Scheduler { sender, dispatcher } = self;
        drop(sender);

        match dispatcher.await {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "scheduler dispatcher failed");
                RunSummary::default()
            }
        }
    }
}

/// Run every target and wait for all of them to settle
pub async fn run(
    targets: impl IntoIterator<Item = ExportTarget>,
    pool: Arc<SessionPool>,
    runner: Arc<dyn ExportRunner>,
    task_timeout: Duration,
) -> RunSummary {
    let scheduler = Scheduler::start(pool, runner, task_timeout);
    for target in targets {
        scheduler.queue(target);
    }
    scheduler.idle().await
}

async fn dispatch(
    mut receiver: mpsc::UnboundedReceiver<ExportTarget>,
    pool: Arc<SessionPool>,
    runner: Arc<dyn ExportRunner>,
    task_timeout: Duration,
) -> RunSummary {
    let mut tasks = JoinSet::new();
    let mut summary = RunSummary::default();

    while let Some(target) = receiver.recv().await {
        while let Some(joined) = tasks.try_join_next() {
            settle(&mut summary, joined);
        }

        // Blocks while every slot is busy
        let pooled = match pool.checkout().await {
            Ok(pooled) => pooled,
            Err(e) => {
                error!(title = %target.item.title, error = %e, "no renderer session available");
                summary.record(
                    &target,
                    ExportOutcome::Failed {
                        reason: e.to_string(),
                    },
                );
                continue;
            }
        };

        let span = info_span!("export", title = %target.item.title);
        tasks.spawn(run_task(target, pooled, Arc::clone(&runner), task_timeout).instrument(span));
    }

    while let Some(joined) = tasks.join_next().await {
        settle(&mut summary, joined);
    }

    info!(
        exported = summary.exported,
        failed = summary.failed.len(),
        "all export tasks settled"
    );
    summary
}

fn settle(
    summary: &mut RunSummary,
    joined: Result<(ExportTarget, ExportOutcome), tokio::task::JoinError>,
) {
    match joined {
        Ok((target, outcome)) => summary.record(&target, outcome),
        Err(e) => error!(error = %e, "export task was cancelled"),
    }
}

async fn run_task(
    target: ExportTarget,
    mut pooled: PooledSession,
    runner: Arc<dyn ExportRunner>,
    task_timeout: Duration,
) -> (ExportTarget, ExportOutcome) {
    let attempt = AssertUnwindSafe(async { runner.export(&target, pooled.session()).await })
        .catch_unwind();
    let result = tokio::time::timeout(task_timeout, attempt).await;

    let outcome = match result {
        Ok(Ok(Ok(page))) => {
            info!(document = ?page.document, attachments = page.attachments, "page exported");
            pooled.release().await;
            ExportOutcome::Exported {
                document: page.document,
                attachments: page.attachments,
            }
        }
        Ok(Ok(Err(e))) => {
            error!(dest = ?target.dest_dir, error = %e, "page export failed");
            pooled.release().await;
            ExportOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Ok(Err(_panic)) => {
            error!(dest = ?target.dest_dir, "page export panicked; discarding renderer session");
            drop(pooled);
            ExportOutcome::Failed {
                reason: "export task panicked".to_string(),
            }
        }
        Err(_elapsed) => {
            let e = Error::Timeout {
                after: task_timeout,
            };
            warn!(dest = ?target.dest_dir, error = %e, "page export aborted; discarding renderer session");
            drop(pooled);
            ExportOutcome::TimedOut
        }
    };

    (target, outcome)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
