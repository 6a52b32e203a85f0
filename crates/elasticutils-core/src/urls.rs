//! Endpoint URL construction.
//!
//! Document ids and query parameters are percent-encoded; index names and
//! fixed endpoint paths are not.

use urlencoding::encode;

/// Join `base` and `endpoint` with exactly one `/` between them.
pub fn generate_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Resolve `url` against `base` unless it is already absolute.
pub fn resolve(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        generate_url(base, url)
    }
}

/// Cluster-level search endpoint used for PIT-scoped page requests.
pub fn pit_search_url(base: &str) -> String {
    generate_url(base, "_search")
}

/// Endpoint that releases point-in-time snapshots.
pub fn pit_close_url(base: &str) -> String {
    generate_url(base, "_search/point_in_time")
}

/// Endpoints scoped to one index.
///
/// ```
/// use elasticutils_core::urls::ElasticUrls;
///
/// let urls = ElasticUrls::new("http://localhost:9200/", "logs");
/// assert_eq!(urls.search(), "http://localhost:9200/logs/_search");
/// assert_eq!(urls.document("42"), "http://localhost:9200/logs/_doc/42");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticUrls {
    base_url: String,
    index: String,
}

impl ElasticUrls {
    pub fn new(base_url: &str, index: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.trim_matches('/').to_string(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index
    }

    fn scoped(&self, endpoint: &str) -> String {
        generate_url(&self.base_url, &format!("{}/{}", self.index, endpoint))
    }

    /// The index itself (existence checks, create, delete).
    pub fn index(&self) -> String {
        generate_url(&self.base_url, &self.index)
    }

    /// Add a document with a generated id.
    pub fn add(&self) -> String {
        self.scoped("_doc")
    }

    pub fn search(&self) -> String {
        self.scoped("_search")
    }

    pub fn update_by_query(&self) -> String {
        self.scoped("_update_by_query")
    }

    pub fn delete_by_query(&self) -> String {
        self.scoped("_delete_by_query")
    }

    /// Alias listing for the whole cluster.
    pub fn indices(&self) -> String {
        generate_url(&self.base_url, "_aliases?pretty=true")
    }

    /// Get, add, or delete one document.
    pub fn document(&self, id: &str) -> String {
        self.scoped(&format!("_doc/{}", encode(id)))
    }

    /// Partial update of one document.
    pub fn update(&self, id: &str) -> String {
        self.scoped(&format!("_update/{}", encode(id)))
    }

    /// Open a point-in-time snapshot, e.g. `keep_alive = "5m"`.
    pub fn point_in_time(&self, keep_alive: &str) -> String {
        self.scoped(&format!("_search/point_in_time?keep_alive={}", encode(keep_alive)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_url_single_slash() {
        assert_eq!(generate_url("http://h:9200/", "/x"), "http://h:9200/x");
        assert_eq!(generate_url("http://h:9200", "x"), "http://h:9200/x");
    }

    #[test]
    fn test_resolve_keeps_absolute() {
        assert_eq!(resolve("http://a", "https://b/c"), "https://b/c");
        assert_eq!(resolve("http://a/", "c/_search"), "http://a/c/_search");
    }

    #[test]
    fn test_index_endpoints() {
        let u = ElasticUrls::new("http://h:9200", "/events/");
        assert_eq!(u.index(), "http://h:9200/events");
        assert_eq!(u.add(), "http://h:9200/events/_doc");
        assert_eq!(u.update_by_query(), "http://h:9200/events/_update_by_query");
        assert_eq!(u.delete_by_query(), "http://h:9200/events/_delete_by_query");
        assert_eq!(u.update("7"), "http://h:9200/events/_update/7");
        assert_eq!(u.indices(), "http://h:9200/_aliases?pretty=true");
        assert_eq!(
            u.point_in_time("1m"),
            "http://h:9200/events/_search/point_in_time?keep_alive=1m"
        );
    }

    #[test]
    fn test_ids_are_encoded() {
        let u = ElasticUrls::new("http://h:9200", "events");
        assert_eq!(u.document("a/b?c#d"), "http://h:9200/events/_doc/a%2Fb%3Fc%23d");
        assert_eq!(u.update("x y"), "http://h:9200/events/_update/x%20y");
        assert_eq!(u.document("doc-1_a.b~"), "http://h:9200/events/_doc/doc-1_a.b~");
        assert_eq!(
            u.point_in_time("1m&x=1"),
            "http://h:9200/events/_search/point_in_time?keep_alive=1m%26x%3D1"
        );
    }

    #[test]
    fn test_cluster_endpoints() {
        assert_eq!(pit_search_url("http://h/"), "http://h/_search");
        assert_eq!(pit_close_url("http://h"), "http://h/_search/point_in_time");
    }
}
