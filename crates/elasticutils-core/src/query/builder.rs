use serde_json::Value;

use super::aggregation::{AggregationChain, AggregationSpec, AggsParams, SortField, SortOrder};
use super::predicate::{BoolQuery, Bounds, Occur, Predicate};
use super::Query;
use crate::error::{Error, Result};

/// Root of the query tree under construction.
///
/// The selected clause group is part of the boolean state, so a builder can
/// never point at a group without owning a boolean container.
#[derive(Debug, Clone, Default)]
enum Root {
    #[default]
    Empty,
    Leaf(Predicate),
    Bool { query: BoolQuery, current: Occur },
}

/// Incremental, fail-fast assembler of a single search request body.
///
/// Every call either leaves the builder in a serializable state or returns an
/// error without changing it. [`build`](QueryBuilder::build) can be called any
/// number of times.
///
/// A builder has one owner; share built [`Query`] values instead.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    root: Root,
    aggs: AggregationChain,
    sort: Vec<SortField>,
    size: Option<u64>,
    from: Option<u64>,
    source: Option<Vec<String>>,
    script: Option<Value>,
    track_total_hits: Option<bool>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ── leaf predicates ──────────────────────────────────────────────

    pub fn match_query(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.put(Predicate::Match {
            field: field.to_string(),
            value: value.into(),
        })
    }

    pub fn match_phrase(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.put(Predicate::MatchPhrase {
            field: field.to_string(),
            value: value.into(),
        })
    }

    pub fn term(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self> {
        self.put(Predicate::Term {
            field: field.to_string(),
            value: value.into(),
        })
    }

    pub fn terms<I, V>(&mut self, field: &str, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.put(Predicate::Terms {
            field: field.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        })
    }

    /// Add a `range` predicate. Fails with [`Error::MissingBound`] when
    /// `bounds` sets neither `gte` nor `lte`.
    pub fn range(&mut self, field: &str, bounds: Bounds) -> Result<&mut Self> {
        if bounds.is_empty() {
            return Err(Error::MissingBound {
                field: field.to_string(),
            });
        }
        self.put(Predicate::Range {
            field: field.to_string(),
            bounds,
        })
    }

    pub fn exists(&mut self, field: &str) -> Result<&mut Self> {
        self.put(Predicate::Exists {
            field: field.to_string(),
        })
    }

    pub fn query_string(&mut self, field: &str, query: impl Into<String>) -> Result<&mut Self> {
        self.put(Predicate::QueryString {
            default_field: field.to_string(),
            query: query.into(),
        })
    }

    fn put(&mut self, predicate: Predicate) -> Result<&mut Self> {
        match self.root {
            Root::Empty => self.root = Root::Leaf(predicate),
            Root::Leaf(ref existing) => {
                return Err(Error::StructuralConflict(format!(
                    "cannot combine a bare {} predicate with {}",
                    existing.kind(),
                    predicate.kind()
                )))
            }
            Root::Bool {
                ref mut query,
                current,
            } => query.push(current, predicate),
        }
        Ok(self)
    }

    // ── clause selectors ─────────────────────────────────────────────

    pub fn must(&mut self) -> Result<&mut Self> {
        self.select(Occur::Must)
    }

    pub fn should(&mut self) -> Result<&mut Self> {
        self.select(Occur::Should)
    }

    pub fn filter(&mut self) -> Result<&mut Self> {
        self.select(Occur::Filter)
    }

    pub fn must_not(&mut self) -> Result<&mut Self> {
        self.select(Occur::MustNot)
    }

    /// Point subsequent predicates at `occur`, opening the boolean container
    /// on first use.
    pub fn select(&mut self, occur: Occur) -> Result<&mut Self> {
        match self.root {
            Root::Empty => {
                self.root = Root::Bool {
                    query: BoolQuery::new(),
                    current: occur,
                }
            }
            Root::Leaf(ref existing) => {
                return Err(Error::StructuralConflict(format!(
                    "cannot open a {} clause next to a bare {} predicate",
                    occur.as_str(),
                    existing.kind()
                )))
            }
            Root::Bool { ref mut current, .. } => *current = occur,
        }
        Ok(self)
    }

    /// The clause group new predicates are appended to, if in boolean mode.
    pub fn current_group(&self) -> Option<Occur> {
        match self.root {
            Root::Bool { current, .. } => Some(current),
            _ => None,
        }
    }

    /// Nest the boolean block of `sub` into the current clause group.
    ///
    /// The sub-query is copied; later changes to `sub` do not affect `self`.
    pub fn add_bool(&mut self, sub: &QueryBuilder) -> Result<&mut Self> {
        let (query, current) = match self.root {
            Root::Bool {
                ref mut query,
                current,
            } => (query, current),
            _ => return Err(Error::CannotNest),
        };
        let built = sub.build();
        let nested = built.bool_root().ok_or(Error::MissingBool)?;
        query.push(current, Predicate::Bool(nested.clone()));
        Ok(self)
    }

    /// Accepts an integer or a string such as `"75%"`.
    pub fn minimum_should_match(&mut self, value: impl Into<Value>) -> Result<&mut Self> {
        match self.root {
            Root::Bool { ref mut query, .. } => query.set_minimum_should_match(value.into()),
            _ => return Err(Error::NotApplicable("minimum_should_match")),
        }
        Ok(self)
    }

    // ── aggregations and sorting ─────────────────────────────────────

    /// Append one level to the aggregation chain from loosely typed params.
    pub fn aggs(&mut self, field: &str, params: AggsParams) -> Result<&mut Self> {
        let spec = params.into_spec(field)?;
        Ok(self.aggregate(spec))
    }

    pub fn aggregate(&mut self, spec: AggregationSpec) -> &mut Self {
        self.aggs.push(spec);
        self
    }

    /// Append a sort key; `order` must be `asc` or `desc`.
    pub fn sort(&mut self, field: &str, order: &str) -> Result<&mut Self> {
        let order = order.parse::<SortOrder>()?;
        Ok(self.sort_by(field, order))
    }

    pub fn sort_by(&mut self, field: &str, order: SortOrder) -> &mut Self {
        self.sort.push(SortField::new(field, order));
        self
    }

    // ── plain setters ────────────────────────────────────────────────

    pub fn query_size(&mut self, size: u64) -> &mut Self {
        self.size = Some(size);
        self
    }

    pub fn from_size(&mut self, from: u64, size: u64) -> &mut Self {
        self.from = Some(from);
        self.size = Some(size);
        self
    }

    /// Restrict returned fields. An empty list leaves the projection unset.
    pub fn source<I, S>(&mut self, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if !fields.is_empty() {
            self.source = Some(fields);
        }
        self
    }

    pub fn add_script(&mut self, script: Value) -> &mut Self {
        self.script = Some(script);
        self
    }

    pub fn track_total_hits(&mut self, track: bool) -> &mut Self {
        self.track_total_hits = Some(track);
        self
    }

    /// Snapshot the current state as a [`Query`].
    pub fn build(&self) -> Query {
        let query = match self.root {
            Root::Empty => None,
            Root::Leaf(ref p) => Some(p.clone()),
            Root::Bool { ref query, .. } => Some(Predicate::Bool(query.clone())),
        };
        Query {
            query,
            size: self.size,
            from: self.from,
            source: self.source.clone(),
            sort: self.sort.clone(),
            aggs: self.aggs.clone(),
            script: self.script.clone(),
            track_total_hits: self.track_total_hits,
        }
    }
}
