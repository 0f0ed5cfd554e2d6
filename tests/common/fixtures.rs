//! Mock wiki responses and source configuration builders

use confluence_offline_copy::{ConfigFile, SourceConfig};
use serde_json::{Value, json};
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Query selecting standalone pages by default
pub const CQL_SINGLE: &str = "label = \"offline-copy\"";
/// Query selecting tree roots by default
pub const CQL_TREE: &str = "label = \"offline-copy-tree\"";

/// A search result record for page `id` titled `title` in `space`
pub fn search_record(id: &str, title: &str, space: &str) -> Value {
    json!({
        "title": title,
        "url": format!("/display/{}/{}", space, title.replace(' ', "+")),
        "content": {
            "id": id,
            "type": "page",
            "_expandable": { "space": format!("/rest/api/space/{}", space) }
        }
    })
}

/// A single, final result page
pub fn result_page(results: Vec<Value>) -> ResponseTemplate {
    let size = results.len();
    ResponseTemplate::new(200).set_body_json(json!({
        "results": results,
        "start": 0,
        "limit": 25,
        "size": size
    }))
}

/// Answer `cql` searches with `results`
pub async fn mount_search(server: &MockServer, cql: &str, results: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/rest/api/search"))
        .and(query_param("cql", cql))
        .respond_with(result_page(results))
        .mount(server)
        .await;
}

/// Answer the attachment listing of page `id` with `attachments` (title, body)
pub async fn mount_attachments(server: &MockServer, id: &str, attachments: &[(&str, &[u8])]) {
    let records = attachments
        .iter()
        .map(|(title, _)| {
            json!({
                "title": title,
                "_links": { "download": format!("/download/attachments/{}/{}", id, title) }
            })
        })
        .collect();

    Mock::given(method("GET"))
        .and(path(format!("/rest/api/content/{}/child/attachment", id)))
        .respond_with(result_page(records))
        .mount(server)
        .await;

    for (title, body) in attachments {
        Mock::given(method("GET"))
            .and(path(format!("/download/attachments/{}/{}", id, title)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
            .mount(server)
            .await;
    }
}

/// Resolve a single-source configuration pointing at `server`
pub fn source_config(server: &MockServer, output_dir: &Path, concurrency: usize) -> SourceConfig {
    let document = json!({
        "defaults": {
            "RETENTION_DAYS": 10,
            "RETRY": { "max_attempts": 0, "initial_delay": 0, "max_delay": 0, "jitter": false }
        },
        "configs": [{
            "BASE_URL": server.uri(),
            "AUTH_HEADER": "Bearer test-token",
            "OUTPUT_DIR": output_dir,
            "CONCURRENCY": concurrency,
            "TASK_TIMEOUT_SECS": 30
        }]
    });

    let file = ConfigFile::from_json(&document.to_string()).unwrap();
    file.sources().unwrap().remove(0)
}
