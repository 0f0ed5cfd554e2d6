use confluence_offline_copy::{ConfigFile, orchestrator};
use std::fs::{File, OpenOptions};
use std::process::ExitCode;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// JSON log written next to the working directory
const LOG_FILE: &str = "confluence-offline-copy.log";

#[tokio::main]
async fn main() -> ExitCode {
    let log_file = OpenOptions::new().create(true).append(true).open(LOG_FILE);
    init_logging(log_file.as_ref().ok().and_then(|f| f.try_clone().ok()));
    if let Err(e) = &log_file {
        warn!(path = LOG_FILE, error = %e, "cannot open log file, logging to console only");
    }

    let started = Instant::now();

    let path = ConfigFile::default_path();
    let sources = match ConfigFile::load(&path).await.and_then(|file| file.sources()) {
        Ok(sources) => sources,
        Err(e) => {
            error!(path = ?path, error = %e, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    info!(path = ?path, sources = sources.len(), "configuration loaded");

    let summary = orchestrator::run_all(&sources).await;

    info!(
        duration_ms = started.elapsed().as_millis() as u64,
        exported = summary.exported,
        failed = summary.failed.len(),
        "Export finished"
    );
    ExitCode::SUCCESS
}

fn init_logging(file: Option<File>) {
    let file_layer = file.map(|file| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(Mutex::new(file))
    });

    let installed = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init();

    if let Err(e) = installed {
        eprintln!("failed to install logger: {e}");
    }
}
