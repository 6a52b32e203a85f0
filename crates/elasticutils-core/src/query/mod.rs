//! Search request bodies and the fail-fast [`QueryBuilder`].
//!
//! # Example
//!
//! ```
//! use elasticutils_core::query::{Bounds, QueryBuilder};
//! use serde_json::json;
//!
//! let mut qb = QueryBuilder::new();
//! qb.must()?
//!     .match_query("status", "active")?
//!     .filter()?
//!     .range("age", Bounds::new().gte(18))?;
//!
//! assert_eq!(
//!     qb.build().to_value(),
//!     json!({"query": {"bool": {
//!         "must": [{"match": {"status": "active"}}],
//!         "filter": [{"range": {"age": {"gte": 18}}}]
//!     }}})
//! );
//! # Ok::<(), elasticutils_core::Error>(())
//! ```

mod aggregation;
mod builder;
mod predicate;

pub use aggregation::{
    AggKind, AggregationChain, AggregationSpec, AggsParams, SortField, SortOn, SortOrder, AGG_NAME,
};
pub use builder::QueryBuilder;
pub use predicate::{BoolQuery, Bounds, Occur, Predicate};

use serde::Serialize;
use serde_json::Value;

/// A fully assembled search request body.
///
/// Produced by [`QueryBuilder::build`]. A `None` query means "match all" and
/// is omitted from the wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Query {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<Predicate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<u64>,
    #[serde(rename = "_source", skip_serializing_if = "Option::is_none")]
    pub source: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sort: Vec<SortField>,
    #[serde(skip_serializing_if = "AggregationChain::is_empty")]
    pub aggs: AggregationChain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_total_hits: Option<bool>,
}

impl Query {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.to_value()).unwrap_or_default()
    }

    /// The predicate to embed in a search body, `match_all` when unset.
    pub fn predicate_or_match_all(&self) -> Value {
        match self.query {
            Some(ref p) => p.to_value(),
            None => serde_json::json!({ "match_all": {} }),
        }
    }

    /// The boolean root, if this query has one.
    pub fn bool_root(&self) -> Option<&BoolQuery> {
        match self.query {
            Some(Predicate::Bool(ref b)) => Some(b),
            _ => None,
        }
    }
}
