//! §3 DATA MODEL — `UrlRecord`, `QueueItem`, `Report`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single (status, url) hop recorded while following redirects.
pub type Redirect = (u16, String);

/// The manager's record of one URL. Owned by storage; the manager only
/// ever holds transient references to it in `PrefetchBuffer`, `GivenCache`,
/// and `ReportQueue`.
///
/// **Invariant:** `url` is non-empty and canonical and unique across the
/// store. If `visited` is `None`, all result fields are `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    #[serde(default)]
    pub visited: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub fetch_time_ms: Option<u64>,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub redirects: Vec<Redirect>,
}

impl UrlRecord {
    /// A freshly-sighted record: nothing has been fetched yet.
    pub fn stub(url: impl Into<String>, parent: Option<String>) -> Self {
        Self {
            url: url.into(),
            visited: None,
            headers: HashMap::new(),
            status_code: None,
            result: None,
            fetch_time_ms: None,
            parent,
            redirects: Vec::new(),
        }
    }

    /// Merge `report` fields into `self`, last-writer-wins (§5 "GivenCache
    /// merges are last-writer-wins"). Only fields a `Report` carries are
    /// touched; `parent` is preserved from `self` unless the report names
    /// one.
    pub fn merge_report(&mut self, report: &Report) {
        if let Some(result) = &report.result {
            self.result = Some(result.clone());
        }
        if report.status_code.is_some() {
            self.status_code = report.status_code;
        }
        if !report.headers.is_empty() {
            self.headers = report.headers.clone();
        }
        if report.fetch_time_ms.is_some() {
            self.fetch_time_ms = report.fetch_time_ms;
        }
        if let Some(visited) = &report.visited {
            self.visited = Some(visited.clone());
        }
    }
}

/// Server-side projection of a `UrlRecord` dispensed to a worker. Workers
/// never modify fields outside of this subset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueItem {
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub visited: Option<String>,
}

impl From<&UrlRecord> for QueueItem {
    fn from(r: &UrlRecord) -> Self {
        Self {
            url: r.url.clone(),
            headers: r.headers.clone(),
            visited: r.visited.clone(),
        }
    }
}

/// A worker's report of one fetch, or (when `url` is `None`) a pure
/// "please enqueue these links" bulk-append message.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Report {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub fetch_time_ms: Option<u64>,
    #[serde(default)]
    pub visited: Option<String>,
    #[serde(default)]
    pub content: Option<Vec<u8>>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub links: Option<Vec<String>>,
}

impl Report {
    /// The identity this report de-duplicates on in queue/batch scans.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_report_is_last_writer_wins_per_field() {
        let mut cached = UrlRecord::stub("http://a/", None);
        cached.result = Some("stale".into());

        let report = Report {
            url: Some("http://a/".into()),
            result: Some("OK".into()),
            status_code: Some(200),
            visited: Some("2024-01-01T00:00:00".into()),
            ..Default::default()
        };
        cached.merge_report(&report);

        assert_eq!(cached.result.as_deref(), Some("OK"));
        assert_eq!(cached.status_code, Some(200));
        assert_eq!(cached.visited.as_deref(), Some("2024-01-01T00:00:00"));
    }

    #[test]
    fn queue_item_projects_only_the_public_subset() {
        let mut rec = UrlRecord::stub("http://a/", Some("http://p/".into()));
        rec.result = Some("OK".into());
        rec.status_code = Some(200);

        let item = QueueItem::from(&rec);
        assert_eq!(item.url, "http://a/");
        assert_eq!(item.visited, None);
    }
}
