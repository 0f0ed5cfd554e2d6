//! Configuration types for confluence-offline-copy
//!
//! The configuration file enumerates one or more sources. Every option can be
//! set per source, falls back to the shared `defaults` block, and finally to
//! a literal default:
//!
//! ```json
//! {
//!   "defaults": { "AUTH_HEADER": "Bearer …", "RETENTION_DAYS": 10 },
//!   "configs": [
//!     { "BASE_URL": "https://wiki.example.com", "OUTPUT_DIR": "./output/main" }
//!   ]
//! }
//! ```

use crate::error::{Error, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default query for pages exported on their own
pub const DEFAULT_CQL_SINGLE: &str = "label = \"offline-copy\"";

/// Default query for page tree roots
pub const DEFAULT_CQL_TREE: &str = "label = \"offline-copy-tree\"";

/// Config file name looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the config file location
pub const CONFIG_PATH_ENV: &str = "CONFLUENCE_OFFLINE_COPY_CONFIG";

/// Top-level layout of the configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Values shared by every source unless overridden
    #[serde(default)]
    pub defaults: SourceOptions,

    /// One entry per wiki source to export
    #[serde(default)]
    pub configs: Vec<SourceOptions>,
}

/// Raw, possibly partial options for one source
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SourceOptions {
    /// Wiki base URL, e.g. `https://wiki.example.com`
    #[serde(default)]
    pub base_url: Option<String>,

    /// Value of the `Authorization` header sent with every request
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Query selecting pages exported on their own
    #[serde(default)]
    pub cql_single: Option<String>,

    /// Query selecting roots of page trees
    #[serde(default)]
    pub cql_tree: Option<String>,

    /// Root of the dated snapshot directories
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Snapshots older than this many days are pruned
    #[serde(default)]
    pub retention_days: Option<u32>,

    /// Number of pages rendered at the same time
    #[serde(default)]
    pub concurrency: Option<usize>,

    /// Results requested per search page
    #[serde(default)]
    pub page_size: Option<u32>,

    /// Wall-clock ceiling for a single export task
    #[serde(default)]
    pub task_timeout_secs: Option<u64>,

    /// Explicit headless browser binary (searched on PATH otherwise)
    #[serde(default)]
    pub chrome_path: Option<PathBuf>,

    /// CSS paper size of rendered documents
    #[serde(default)]
    pub paper_format: Option<String>,

    /// CSS margin applied to every side of rendered documents
    #[serde(default)]
    pub page_margin: Option<String>,

    /// Retry policy for search API requests
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

/// Fully resolved settings for one source
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// Wiki base URL without trailing slash
    pub base_url: String,
    /// `Authorization` header value, if any
    pub auth_header: Option<String>,
    /// Query selecting pages exported on their own
    pub cql_single: String,
    /// Query selecting roots of page trees
    pub cql_tree: String,
    /// Root of the dated snapshot directories
    pub output_dir: PathBuf,
    /// Retention window in days
    pub retention_days: u32,
    /// Maximum concurrent export tasks (and renderer sessions)
    pub concurrency: usize,
    /// Results requested per search page
    pub page_size: u32,
    /// Wall-clock ceiling for a single export task
    pub task_timeout: Duration,
    /// Explicit headless browser binary
    pub chrome_path: Option<PathBuf>,
    /// Document layout
    pub print: PrintOptions,
    /// Retry policy for search API requests
    pub retry: RetryConfig,
}

impl SourceConfig {
    /// Directory of the snapshot taken on `date`: `OUTPUT_DIR/<YYYY-MM-DD>`
    pub fn snapshot_dir(&self, date: NaiveDate) -> PathBuf {
        self.output_dir.join(date.format("%Y-%m-%d").to_string())
    }
}

/// Paper size and margins of rendered documents
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintOptions {
    /// Paper size name (e.g. "A2")
    pub format: String,
    /// Length used for all four margins (e.g. "10px")
    pub margin: String,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            format: default_paper_format(),
            margin: default_page_margin(),
        }
    }
}

/// Paper sizes accepted as `PAPER_FORMAT`, width by height in inches
const PAPER_SIZES: &[(&str, f64, f64)] = &[
    ("letter", 8.5, 11.0),
    ("legal", 8.5, 14.0),
    ("tabloid", 11.0, 17.0),
    ("ledger", 17.0, 11.0),
    ("a0", 33.1, 46.8),
    ("a1", 23.4, 33.1),
    ("a2", 16.54, 23.4),
    ("a3", 11.7, 16.54),
    ("a4", 8.27, 11.7),
    ("a5", 5.83, 8.27),
    ("a6", 4.13, 5.83),
];

impl PrintOptions {
    /// Paper width and height in inches
    ///
    /// # Errors
    /// Returns a configuration error for an unknown format name
    pub fn paper_size_inches(&self) -> Result<(f64, f64)> {
        PAPER_SIZES
            .iter()
            .find(|(name, _, _)| self.format.eq_ignore_ascii_case(name))
            .map(|(_, width, height)| (*width, *height))
            .ok_or_else(|| {
                Error::config(
                    "PAPER_FORMAT",
                    format!("unknown paper format {:?}", self.format),
                )
            })
    }

    /// Margin in inches; accepts `px` (also the unit of a bare number), `in`, `cm` and `mm`
    ///
    /// # Errors
    /// Returns a configuration error if the length cannot be parsed
    pub fn margin_inches(&self) -> Result<f64> {
        let invalid = || {
            Error::config(
                "PAGE_MARGIN",
                format!("invalid page margin {:?}", self.margin),
            )
        };

        let margin = self.margin.trim().to_ascii_lowercase();
        let split = margin
            .find(|c: char| c.is_ascii_alphabetic())
            .unwrap_or(margin.len());
        let (number, unit) = margin.split_at(split);
        let value: f64 = number.trim().parse().map_err(|_| invalid())?;
        if !value.is_finite() || value < 0.0 {
            return Err(invalid());
        }

        let per_inch = match unit {
            "" | "px" => 96.0,
            "in" => 1.0,
            "cm" => 2.54,
            "mm" => 25.4,
            _ => return Err(invalid()),
        };
        Ok(value / per_inch)
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry, in seconds (default: 1)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries, in seconds (default: 30)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl ConfigFile {
    /// Parse a configuration document
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| Error::Config {
            message: format!("malformed configuration: {}", e),
            key: None,
        })
    }

    /// Read and parse the configuration file at `path`
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Config {
                message: format!("cannot read {}: {}", path.display(), e),
                key: None,
            })?;
        Self::from_json(&content)
    }

    /// Config file location: `$CONFLUENCE_OFFLINE_COPY_CONFIG` or `./config.json`
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Resolve every source against the shared defaults
    ///
    /// Resolution happens for all sources up front so that a bad entry aborts
    /// the run before any export starts.
    pub fn sources(&self) -> Result<Vec<SourceConfig>> {
        if self.configs.is_empty() {
            return Err(Error::config("configs", "no sources configured"));
        }
        self.configs
            .iter()
            .map(|source| source.resolve(&self.defaults))
            .collect()
    }
}

impl SourceOptions {
    /// Merge these options over `defaults` and fill in literal defaults
    pub fn resolve(&self, defaults: &SourceOptions) -> Result<SourceConfig> {
        let base_url = self
            .base_url
            .as_ref()
            .or(defaults.base_url.as_ref())
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::config("BASE_URL", "BASE_URL is required"))?;
        url::Url::parse(&base_url)
            .map_err(|e| Error::config("BASE_URL", format!("invalid BASE_URL {base_url}: {e}")))?;

        let concurrency = self
            .concurrency
            .or(defaults.concurrency)
            .unwrap_or_else(default_concurrency);
        if concurrency == 0 {
            return Err(Error::config("CONCURRENCY", "CONCURRENCY must be at least 1"));
        }

        let page_size = self
            .page_size
            .or(defaults.page_size)
            .unwrap_or_else(default_page_size);
        if page_size == 0 {
            return Err(Error::config("PAGE_SIZE", "PAGE_SIZE must be at least 1"));
        }

        let print = PrintOptions {
            format: self
                .paper_format
                .clone()
                .or_else(|| defaults.paper_format.clone())
                .unwrap_or_else(default_paper_format),
            margin: self
                .page_margin
                .clone()
                .or_else(|| defaults.page_margin.clone())
                .unwrap_or_else(default_page_margin),
        };
        print.paper_size_inches()?;
        print.margin_inches()?;

        Ok(SourceConfig {
            base_url,
            auth_header: self.auth_header.clone().or_else(|| defaults.auth_header.clone()),
            cql_single: self
                .cql_single
                .clone()
                .or_else(|| defaults.cql_single.clone())
                .unwrap_or_else(|| DEFAULT_CQL_SINGLE.to_string()),
            cql_tree: self
                .cql_tree
                .clone()
                .or_else(|| defaults.cql_tree.clone())
                .unwrap_or_else(|| DEFAULT_CQL_TREE.to_string()),
            output_dir: self
                .output_dir
                .clone()
                .or_else(|| defaults.output_dir.clone())
                .unwrap_or_else(default_output_dir),
            retention_days: self
                .retention_days
                .or(defaults.retention_days)
                .unwrap_or_else(default_retention_days),
            concurrency,
            page_size,
            task_timeout: Duration::from_secs(
                self.task_timeout_secs
                    .or(defaults.task_timeout_secs)
                    .unwrap_or_else(default_task_timeout_secs),
            ),
            chrome_path: self.chrome_path.clone().or_else(|| defaults.chrome_path.clone()),
            print,
            retry: self
                .retry
                .clone()
                .or_else(|| defaults.retry.clone())
                .unwrap_or_default(),
        })
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

fn default_retention_days() -> u32 {
    10
}

fn default_concurrency() -> usize {
    2
}

fn default_page_size() -> u32 {
    25
}

fn default_task_timeout_secs() -> u64 {
    120
}

fn default_paper_format() -> String {
    "A2".to_string()
}

fn default_page_margin() -> String {
    "10px".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
