//! Per-source run sequencing: discover, export, sweep
//!
//! Sources are processed one after another. For each one the orchestrator
//! searches for standalone pages and tree roots, expands the trees, queues
//! every resulting target on a [`Scheduler`], waits for it to drain and then
//! prunes expired snapshots. Failures are contained per step and reported in
//! the returned [`RunSummary`]; nothing here aborts the process.

use crate::api::ApiClient;
use crate::config::SourceConfig;
use crate::export::PageExporter;
use crate::render::{ChromeRenderer, Renderer, SessionPool, resolve_binary};
use crate::retention::prune_expired_snapshots;
use crate::scheduler::Scheduler;
use crate::tree::{expand_trees, standalone_targets};
use crate::types::RunSummary;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{Instrument, error, info, info_span, warn};

/// Run every source in order and return the combined summary
///
/// A headless browser is started per source, honouring its `CHROME_PATH`,
/// and closed once the source is done. A source whose browser cannot be
/// started exports nothing, but its expired snapshots are still swept.
pub async fn run_all(sources: &[SourceConfig]) -> RunSummary {
    let today = Utc::now().date_naive();
    let mut total = RunSummary::default();

    for config in sources {
        let launched = match resolve_binary(config.chrome_path.as_deref()) {
            Ok(binary) => ChromeRenderer::launch(binary, config.task_timeout).await,
            Err(e) => Err(e),
        };
        let renderer = match launched {
            Ok(renderer) => Arc::new(renderer),
            Err(e) => {
                error!(base_url = %config.base_url, error = %e, "cannot start browser, skipping export");
                total
                    .discovery_errors
                    .push(format!("{}: {}", config.base_url, e));
                sweep(config)
                    .instrument(info_span!("source", base_url = %config.base_url))
                    .await;
                continue;
            }
        };
        info!(browser = ?renderer.binary_path(), "using headless browser");

        total.merge(run_source(config, Arc::clone(&renderer) as Arc<dyn Renderer>, today).await);

        if let Err(e) = renderer.shutdown().await {
            warn!(error = %e, "browser did not shut down cleanly");
        }
    }

    total
}

/// Take one snapshot of a source dated `today`, then apply retention
pub async fn run_source(
    config: &SourceConfig,
    renderer: Arc<dyn Renderer>,
    today: NaiveDate,
) -> RunSummary {
    let span = info_span!("source", base_url = %config.base_url);
    async move {
        let summary = match ApiClient::new(config) {
            Ok(client) => export_snapshot(config, client, renderer, today).await,
            Err(e) => {
                error!(error = %e, "cannot create API client");
                RunSummary {
                    discovery_errors: vec![e.to_string()],
                    ..Default::default()
                }
            }
        };

        sweep(config).await;
        report(&summary);
        summary
    }
    .instrument(span)
    .await
}

async fn export_snapshot(
    config: &SourceConfig,
    client: ApiClient,
    renderer: Arc<dyn Renderer>,
    today: NaiveDate,
) -> RunSummary {
    let snapshot_dir = config.snapshot_dir(today);
    let mut discovery_errors = Vec::new();

    let singles = match client.search(&config.cql_single).await {
        Ok(items) => items,
        Err(e) => {
            error!(cql = %config.cql_single, error = %e, "search for single pages failed");
            discovery_errors.push(format!("search \"{}\": {}", config.cql_single, e));
            Vec::new()
        }
    };
    let roots = match client.search(&config.cql_tree).await {
        Ok(items) => items,
        Err(e) => {
            error!(cql = %config.cql_tree, error = %e, "search for page trees failed");
            discovery_errors.push(format!("search \"{}\": {}", config.cql_tree, e));
            Vec::new()
        }
    };
    info!(
        singles = singles.len(),
        trees = roots.len(),
        "discovered content"
    );

    let expansion = expand_trees(&client, roots).await;
    discovery_errors.extend(expansion.errors);

    let mut targets = standalone_targets(&snapshot_dir, singles);
    targets.extend(
        expansion
            .entries
            .into_iter()
            .map(|entry| entry.into_target(&snapshot_dir)),
    );

    let pool = SessionPool::new(renderer, config.concurrency);
    let runner = Arc::new(PageExporter::new(client, config.print.clone()));
    let scheduler = Scheduler::start(Arc::clone(&pool), runner, config.task_timeout);

    info!(tasks = targets.len(), ?snapshot_dir, concurrency = pool.size(), "queueing exports");
    for target in targets {
        scheduler.queue(target);
    }
    let mut summary = scheduler.idle().await;
    pool.clear().await;

    summary.discovery_errors = discovery_errors;
    summary
}

async fn sweep(config: &SourceConfig) {
    let pruned = prune_expired_snapshots(&config.output_dir, config.retention_days).await;
    if !pruned.removed.is_empty() {
        info!(removed = pruned.removed.len(), "pruned expired snapshots");
    }
}

fn report(summary: &RunSummary) {
    info!(
        exported = summary.exported,
        attachments = summary.attachments,
        failed = summary.failed.len(),
        discovery_errors = summary.discovery_errors.len(),
        "source finished"
    );
    for failed in &summary.failed {
        warn!(title = %failed.title, dest = ?failed.dest_dir, reason = %failed.reason, "not exported");
    }
}
