//! Search/content API client
//!
//! Wraps the wiki's REST API:
//! - `GET <base>/rest/api/search?cql=…&start=…&limit=…` for page discovery
//! - `GET <base>/rest/api/content/{id}/child/attachment` for attachment listings
//! - plain `GET <base><download link>` for attachment bodies
//!
//! Both listing endpoints share one paginated shape, consumed by
//! [`ApiClient::fetch_all`].

use crate::config::{RetryConfig, SourceConfig};
use crate::error::{Error, Result};
use crate::retry::fetch_with_retry;
use crate::types::{AttachmentRef, ContentItem};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

/// Search endpoint, relative to the base URL
pub const SEARCH_PATH: &str = "/rest/api/search";

/// Longest response body kept in an [`Error::HttpStatus`]
const MAX_ERROR_BODY: usize = 512;

/// Ceiling for a single listing request (downloads are bounded by the task timeout instead)
const PAGE_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// One page of a paginated listing
#[derive(Debug, Deserialize)]
pub struct ResultPage<T> {
    /// Records on this page
    pub results: Vec<T>,
    /// Page size the server actually applied
    #[serde(default)]
    pub limit: Option<u32>,
    /// Number of records on this page as reported by the server
    #[serde(default)]
    pub size: Option<u32>,
}

/// Raw search result record
#[derive(Debug, Deserialize)]
pub struct SearchRecord {
    /// Display title
    pub title: String,
    /// Relative URL of the rendered page
    #[serde(default)]
    pub url: Option<String>,
    /// Embedded content reference
    #[serde(default)]
    pub content: Option<ContentRecord>,
}

/// `content` block of a search result
#[derive(Debug, Deserialize)]
pub struct ContentRecord {
    /// Content identifier
    pub id: String,
    /// Expanded space reference, when the server inlines it
    #[serde(default)]
    pub space: Option<SpaceRecord>,
    /// Links to collapsed sub-resources
    #[serde(rename = "_expandable", default)]
    pub expandable: Option<ExpandableRecord>,
}

/// Inline space reference
#[derive(Debug, Deserialize)]
pub struct SpaceRecord {
    /// Space key
    pub key: String,
}

/// `_expandable` block of a content record
#[derive(Debug, Deserialize)]
pub struct ExpandableRecord {
    /// Space resource path, e.g. `/rest/api/space/DOC`
    #[serde(default)]
    pub space: Option<String>,
}

/// Raw attachment record
#[derive(Debug, Deserialize)]
pub struct AttachmentRecord {
    /// File name
    pub title: String,
    /// Link block
    #[serde(rename = "_links")]
    pub links: AttachmentLinks,
}

/// `_links` block of an attachment record
#[derive(Debug, Deserialize)]
pub struct AttachmentLinks {
    /// Download path, relative to the base URL
    pub download: String,
}

impl TryFrom<SearchRecord> for ContentItem {
    type Error = Error;

    fn try_from(record: SearchRecord) -> Result<Self> {
        let content = record
            .content
            .ok_or_else(|| Error::InvalidRecord(format!("\"{}\" has no content", record.title)))?;

        let space = content
            .expandable
            .as_ref()
            .and_then(|e| e.space.as_deref())
            .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
            .map(str::to_string)
            .or_else(|| content.space.as_ref().map(|s| s.key.clone()))
            .ok_or_else(|| {
                Error::InvalidRecord(format!("\"{}\" has no space reference", record.title))
            })?;

        let page_url = record
            .url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::InvalidRecord(format!("\"{}\" has no page URL", record.title)))?;

        Ok(ContentItem {
            attachments_url: format!("/rest/api/content/{}/child/attachment", content.id),
            title: record.title,
            id: content.id,
            space,
            page_url,
        })
    }
}

impl From<AttachmentRecord> for AttachmentRef {
    fn from(record: AttachmentRecord) -> Self {
        Self {
            title: record.title,
            download_url: record.links.download,
        }
    }
}

/// Client for one wiki source
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    page_size: u32,
    retry: RetryConfig,
}

impl ApiClient {
    /// Build a client for a resolved source configuration
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created or `AUTH_HEADER`
    /// is not a valid header value
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("confluence-offline-copy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Other(format!("Failed to create HTTP client: {}", e)))?;

        Self::with_client(
            http,
            &config.base_url,
            config.auth_header.as_deref(),
            config.page_size,
            config.retry.clone(),
        )
    }

    /// Build a client around an existing HTTP transport
    pub fn with_client(
        http: reqwest::Client,
        base_url: &str,
        auth_header: Option<&str>,
        page_size: u32,
        retry: RetryConfig,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = auth_header {
            let mut value = HeaderValue::from_str(auth)
                .map_err(|e| Error::config("AUTH_HEADER", format!("invalid header value: {e}")))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            headers,
            page_size: page_size.max(1),
            retry,
        })
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Headers sent with every request
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Absolute URL for a path relative to the base URL
    ///
    /// Paths returned by the API are relative to the base including any
    /// context path (`https://host/wiki`), so they are appended rather than
    /// resolved.
    pub fn url(&self, relative: &str) -> Result<Url> {
        if relative.starts_with('/') {
            Ok(Url::parse(&format!("{}{}", self.base_url, relative))?)
        } else {
            Ok(Url::parse(&format!("{}/{}", self.base_url, relative))?)
        }
    }

    /// Fetch every record of a paginated listing, in server order
    ///
    /// Pages are requested strictly one after another. Pagination stops at
    /// the first page holding fewer records than the page size, which
    /// includes an empty page. Each page request is retried on transient
    /// failures; any other failure abandons the whole listing so callers
    /// never see partial data.
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<T>> {
        let mut records = Vec::new();
        let mut start: u64 = 0;
        let mut limit = self.page_size;

        loop {
            let mut url = self.url(path)?;
            {
                let mut query = url.query_pairs_mut();
                for (key, value) in params {
                    query.append_pair(key, value);
                }
                query.append_pair("start", &start.to_string());
                query.append_pair("limit", &limit.to_string());
            }

            debug!(%url, start, limit, "fetching result page");
            let page: ResultPage<T> = fetch_with_retry(&self.retry, || self.fetch_page(&url)).await?;

            let received = page.results.len();
            records.extend(page.results);

            // The server may cap the page size below what was requested
            let applied = page.limit.filter(|l| *l > 0 && *l < limit).unwrap_or(limit);
            debug!(received, applied, total = records.len(), "got result page");

            if received < applied as usize {
                break;
            }
            limit = applied;
            start += u64::from(applied);
        }

        info!(path, total = records.len(), "paginated fetch complete");
        Ok(records)
    }

    async fn fetch_page<T: DeserializeOwned>(&self, url: &Url) -> Result<ResultPage<T>> {
        let response = self
            .http
            .get(url.clone())
            .headers(self.headers.clone())
            .timeout(PAGE_REQUEST_TIMEOUT)
            .send()
            .await?;

        let response = error_for_status(response, url).await?;
        Ok(response.json::<ResultPage<T>>().await?)
    }

    /// Run a CQL search and return every matching page
    ///
    /// Records that cannot be mapped to a [`ContentItem`] are skipped with a warning.
    pub async fn search(&self, cql: &str) -> Result<Vec<ContentItem>> {
        let records: Vec<SearchRecord> = self.fetch_all(SEARCH_PATH, &[("cql", cql)]).await?;

        let items = records
            .into_iter()
            .filter_map(|record| match ContentItem::try_from(record) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!(error = %e, cql, "skipping search result");
                    None
                }
            })
            .collect();
        Ok(items)
    }

    /// Direct children of a page
    pub async fn children_of(&self, item: &ContentItem) -> Result<Vec<ContentItem>> {
        self.search(&format!("parent = {}", item.id)).await
    }

    /// Every attachment of a page
    pub async fn list_attachments(&self, item: &ContentItem) -> Result<Vec<AttachmentRef>> {
        let records: Vec<AttachmentRecord> = self.fetch_all(&item.attachments_url, &[]).await?;
        Ok(records.into_iter().map(AttachmentRef::from).collect())
    }

    /// Stream a file at `relative_url` to `dest`, returning the bytes written
    pub async fn download(&self, relative_url: &str, dest: &Path) -> Result<u64> {
        let url = self.url(relative_url)?;
        let response = self
            .http
            .get(url.clone())
            .headers(self.headers.clone())
            .send()
            .await?;
        let mut response = error_for_status(response, &url).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        debug!(?dest, bytes = written, "download complete");
        Ok(written)
    }
}

/// Turn a non-success response into [`Error::HttpStatus`], keeping part of the body
async fn error_for_status(response: reqwest::Response, url: &Url) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    Err(Error::HttpStatus {
        status: status.as_u16(),
        url: url.to_string(),
        body,
    })
}
