//! Aggregation specs, the singly-nested aggregation chain, and sort keys.
//!
//! Each chain level is keyed `data`; level `n + 1` hangs under level `n`'s
//! `aggs` key, so three levels serialize as `aggs.data.aggs.data.aggs.data`.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// Name every chain level is stored under.
pub const AGG_NAME: &str = "data";

/// Direction of a sort or bucket order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(Error::invalid("sort", other, "asc, desc")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bucket key a `terms` aggregation is ordered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOn {
    #[default]
    Count,
    Key,
}

impl SortOn {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOn::Count => "_count",
            SortOn::Key => "_key",
        }
    }
}

impl FromStr for SortOn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "_count" | "count" => Ok(SortOn::Count),
            "_key" | "key" => Ok(SortOn::Key),
            other => Err(Error::invalid("sort_on", other, "_count, _key")),
        }
    }
}

/// Aggregation kinds understood by [`AggsParams`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggKind {
    #[default]
    Terms,
    DateHistogram,
    TopHits,
    Cardinality,
}

impl FromStr for AggKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "terms" => Ok(AggKind::Terms),
            "date_histogram" => Ok(AggKind::DateHistogram),
            "top_hits" => Ok(AggKind::TopHits),
            "cardinality" => Ok(AggKind::Cardinality),
            other => Err(Error::invalid(
                "aggs_type",
                other,
                "terms, date_histogram, top_hits, cardinality",
            )),
        }
    }
}

/// One validated aggregation level.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationSpec {
    Terms {
        field: String,
        size: u64,
        sort_on: SortOn,
        order: SortOrder,
    },
    DateHistogram {
        field: String,
        fixed_interval: String,
    },
    TopHits {
        size: u64,
    },
    Cardinality {
        field: String,
    },
}

impl AggregationSpec {
    fn body(&self) -> Value {
        match self {
            AggregationSpec::Terms {
                field,
                size,
                sort_on,
                order,
            } => {
                let mut order_map = Map::new();
                order_map.insert(sort_on.as_str().to_string(), json!(order.as_str()));
                json!({ "terms": { "field": field, "order": order_map, "size": size } })
            }
            AggregationSpec::DateHistogram {
                field,
                fixed_interval,
            } => json!({ "date_histogram": { "field": field, "fixed_interval": fixed_interval } }),
            AggregationSpec::TopHits { size } => json!({ "top_hits": { "size": size } }),
            AggregationSpec::Cardinality { field } => json!({ "cardinality": { "field": field } }),
        }
    }
}

/// Loosely typed aggregation parameters, validated by [`AggsParams::into_spec`].
///
/// Mirrors the keyword options callers pass on the command line:
/// `aggs_type`, `size`, `sort`, `sort_on`, `fixed_interval`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggsParams {
    pub aggs_type: Option<String>,
    pub size: Option<u64>,
    pub sort: Option<String>,
    pub sort_on: Option<String>,
    pub fixed_interval: Option<String>,
}

impl AggsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn aggs_type(mut self, kind: impl Into<String>) -> Self {
        self.aggs_type = Some(kind.into());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn sort_on(mut self, sort_on: impl Into<String>) -> Self {
        self.sort_on = Some(sort_on.into());
        self
    }

    pub fn fixed_interval(mut self, interval: impl Into<String>) -> Self {
        self.fixed_interval = Some(interval.into());
        self
    }

    /// Validate every supplied option and produce the spec for `field`.
    ///
    /// `sort` and `sort_on` are checked even when the kind ignores them.
    pub fn into_spec(self, field: &str) -> Result<AggregationSpec> {
        let kind = match self.aggs_type.as_deref() {
            Some(k) => k.parse::<AggKind>()?,
            None => AggKind::default(),
        };
        let order = match self.sort.as_deref() {
            Some(s) => s.parse::<SortOrder>()?,
            None => SortOrder::Desc,
        };
        let sort_on = match self.sort_on.as_deref() {
            Some(s) => s.parse::<SortOn>()?,
            None => SortOn::Count,
        };

        Ok(match kind {
            AggKind::Terms => AggregationSpec::Terms {
                field: field.to_string(),
                size: self.size.unwrap_or(10),
                sort_on,
                order,
            },
            AggKind::DateHistogram => AggregationSpec::DateHistogram {
                field: field.to_string(),
                fixed_interval: self.fixed_interval.unwrap_or_else(|| "1d".to_string()),
            },
            AggKind::TopHits => AggregationSpec::TopHits {
                size: self.size.unwrap_or(1),
            },
            AggKind::Cardinality => AggregationSpec::Cardinality {
                field: field.to_string(),
            },
        })
    }
}

/// The aggregation chain, outermost level first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregationChain {
    levels: Vec<AggregationSpec>,
}

impl AggregationChain {
    /// Attach `spec` below the current deepest level.
    pub fn push(&mut self, spec: AggregationSpec) {
        self.levels.push(spec);
    }

    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn levels(&self) -> &[AggregationSpec] {
        &self.levels
    }

    /// Value of the top-level `aggs` key.
    pub fn to_value(&self) -> Value {
        let mut nested: Option<Value> = None;
        for spec in self.levels.iter().rev() {
            let mut body = spec.body();
            if let (Some(child), Some(obj)) = (nested.take(), body.as_object_mut()) {
                obj.insert("aggs".to_string(), child);
            }
            let mut wrapper = Map::new();
            wrapper.insert(AGG_NAME.to_string(), body);
            nested = Some(Value::Object(wrapper));
        }
        nested.unwrap_or_else(|| json!({}))
    }
}

impl Serialize for AggregationChain {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// One entry of the sort list: `{field: {"order": ...}}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert(self.field.clone(), json!({ "order": self.order.as_str() }));
        Value::Object(map)
    }
}

impl Serialize for SortField {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}
