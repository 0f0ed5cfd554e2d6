//! Page tree expansion and destination paths
//!
//! A tree root is exported together with its direct children. Only one level
//! is resolved: grandchildren are not followed.

use crate::api::ApiClient;
use crate::sanitize::sanitize;
use crate::types::{ContentItem, ExportTarget};
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// A discovered page and the title of the tree root it was found under
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// Discovered page
    pub item: ContentItem,
    /// Root title for children, `None` for roots
    pub ancestor: Option<String>,
}

/// Result of expanding a set of tree roots
#[derive(Debug, Default)]
pub struct TreeExpansion {
    /// Roots and children in emission order
    pub entries: Vec<TreeEntry>,
    /// Child lookups that failed; their roots are still in `entries`
    pub errors: Vec<String>,
}

/// Emit every root followed by its direct children
///
/// Roots are processed in the order given and children in fetch order. A
/// failed child lookup is logged and recorded; the root itself is still
/// exported.
pub async fn expand_trees(client: &ApiClient, roots: Vec<ContentItem>) -> TreeExpansion {
    let mut expansion = TreeExpansion::default();

    for root in roots {
        let children = client.children_of(&root).await;
        let root_title = root.title.clone();
        expansion.entries.push(TreeEntry {
            item: root,
            ancestor: None,
        });

        match children {
            Ok(children) => {
                info!(root = %root_title, children = children.len(), "expanded page tree");
                expansion
                    .entries
                    .extend(children.into_iter().map(|child| TreeEntry {
                        item: child,
                        ancestor: Some(root_title.clone()),
                    }));
            }
            Err(e) => {
                error!(root = %root_title, error = %e, "failed to list child pages");
                expansion
                    .errors
                    .push(format!("children of \"{}\": {}", root_title, e));
            }
        }
    }

    expansion
}

/// Destination directory of a page inside a snapshot
///
/// `space/ancestor/title` for tree children, `space/title` otherwise; every
/// segment is sanitized.
pub fn destination(snapshot_dir: &Path, item: &ContentItem, ancestor: Option<&str>) -> PathBuf {
    let mut dir = snapshot_dir.join(sanitize(&item.space));
    if let Some(ancestor) = ancestor {
        dir.push(sanitize(ancestor));
    }
    dir.push(sanitize(&item.title));
    dir
}

impl TreeEntry {
    /// Pair this entry with its destination inside `snapshot_dir`
    pub fn into_target(self, snapshot_dir: &Path) -> ExportTarget {
        let dest_dir = destination(snapshot_dir, &self.item, self.ancestor.as_deref());
        ExportTarget {
            item: self.item,
            ancestor: self.ancestor,
            dest_dir,
        }
    }
}

/// Targets for pages exported on their own
pub fn standalone_targets(snapshot_dir: &Path, items: Vec<ContentItem>) -> Vec<ExportTarget> {
    items
        .into_iter()
        .map(|item| TreeEntry {
            item,
            ancestor: None,
        })
        .map(|entry| entry.into_target(snapshot_dir))
        .collect()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use serde_json::{Value, json};
    use std::time::Duration;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn item(id: &str, title: &str) -> ContentItem {
        ContentItem {
            title: title.into(),
            id: id.into(),
            space: "DOC".into(),
            page_url: format!("/pages/{id}"),
            attachments_url: format!("/rest/api/content/{id}/child/attachment"),
        }
    }

    fn record(id: &str, title: &str) -> Value {
        json!({
            "title": title,
            "url": format!("/pages/{id}"),
            "content": { "id": id, "_expandable": { "space": "/rest/api/space/DOC" } }
        })
    }

    fn results(records: Vec<Value>) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "results": records, "limit": 25 }))
    }

    fn client(server: &MockServer) -> ApiClient {
        let retry = RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(1),
            backoff_multiplier: 1.0,
            jitter: false,
        };
        ApiClient::with_client(reqwest::Client::new(), &server.uri(), None, 25, retry).unwrap()
    }

    #[tokio::test]
    async fn root_is_followed_by_its_children_in_fetch_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("cql", "parent = 1"))
            .respond_with(results(vec![record("2", "C1"), record("3", "C2")]))
            .expect(1)
            .mount(&server)
            .await;

        let expansion = expand_trees(&client(&server), vec![item("1", "R")]).await;

        let shape: Vec<(&str, Option<&str>)> = expansion
            .entries
            .iter()
            .map(|e| (e.item.title.as_str(), e.ancestor.as_deref()))
            .collect();
        assert_eq!(
            shape,
            vec![("R", None), ("C1", Some("R")), ("C2", Some("R"))]
        );
        assert!(expansion.errors.is_empty());
    }

    #[tokio::test]
    async fn roots_keep_supplied_order_and_failed_lookups_keep_the_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("cql", "parent = 1"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("cql", "parent = 5"))
            .respond_with(results(vec![record("6", "Leaf")]))
            .mount(&server)
            .await;

        let expansion =
            expand_trees(&client(&server), vec![item("1", "Broken"), item("5", "Fine")]).await;

        let titles: Vec<&str> = expansion
            .entries
            .iter()
            .map(|e| e.item.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Broken", "Fine", "Leaf"]);
        assert_eq!(expansion.errors.len(), 1);
        assert!(expansion.errors[0].contains("Broken"));
    }

    #[test]
    fn destination_includes_sanitized_ancestor() {
        let snapshot = Path::new("/out/2024-01-01");
        let child = item("2", "Q1/Q2 plan");

        assert_eq!(
            destination(snapshot, &child, Some("Team: Ops")),
            PathBuf::from("/out/2024-01-01/DOC/Team_ Ops/Q1_Q2 plan")
        );
        assert_eq!(
            destination(snapshot, &child, None),
            PathBuf::from("/out/2024-01-01/DOC/Q1_Q2 plan")
        );
    }

    #[test]
    fn hostile_titles_stay_inside_the_snapshot() {
        let snapshot = Path::new("/out/2024-01-01");
        let mut evil = item("9", "..");
        evil.space = "../..".into();
        let dest = destination(snapshot, &evil, Some("../../etc"));
        assert!(dest.starts_with(snapshot));
        assert!(
            dest.components()
                .all(|c| !matches!(c, std::path::Component::ParentDir))
        );
    }

    #[test]
    fn standalone_targets_have_no_ancestor() {
        let targets = standalone_targets(Path::new("/s"), vec![item("1", "A"), item("2", "B")]);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.ancestor.is_none()));
        assert_eq!(targets[1].dest_dir, PathBuf::from("/s/DOC/B"));
    }
}
