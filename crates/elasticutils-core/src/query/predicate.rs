//! Predicate nodes and the boolean container.
//!
//! Every node serializes to the engine's query DSL through [`Predicate::to_value`].
//! Field order inside a clause group is insertion order.

use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};

/// The four clause groups of a boolean container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    Must,
    Should,
    Filter,
    MustNot,
}

impl Occur {
    pub fn as_str(&self) -> &'static str {
        match self {
            Occur::Must => "must",
            Occur::Should => "should",
            Occur::Filter => "filter",
            Occur::MustNot => "must_not",
        }
    }

    /// Serialization order of the groups inside `bool`.
    pub const ALL: [Occur; 4] = [Occur::Must, Occur::Should, Occur::Filter, Occur::MustNot];
}

/// Lower and/or upper bound of a `range` predicate.
///
/// ```
/// use elasticutils_core::query::Bounds;
///
/// let adults = Bounds::new().gte(18);
/// assert!(!adults.is_empty());
/// assert!(Bounds::new().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bounds {
    pub gte: Option<Value>,
    pub lte: Option<Value>,
}

impl Bounds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.gte.is_none() && self.lte.is_none()
    }

    fn to_value(&self) -> Value {
        let mut bounds = Map::new();
        if let Some(ref gte) = self.gte {
            bounds.insert("gte".to_string(), gte.clone());
        }
        if let Some(ref lte) = self.lte {
            bounds.insert("lte".to_string(), lte.clone());
        }
        Value::Object(bounds)
    }
}

/// A single node of the query tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Match { field: String, value: Value },
    MatchPhrase { field: String, value: Value },
    Term { field: String, value: Value },
    Terms { field: String, values: Vec<Value> },
    Range { field: String, bounds: Bounds },
    Exists { field: String },
    QueryString { default_field: String, query: String },
    Bool(BoolQuery),
}

impl Predicate {
    /// DSL key of the node, e.g. `"match"` or `"bool"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::Match { .. } => "match",
            Predicate::MatchPhrase { .. } => "match_phrase",
            Predicate::Term { .. } => "term",
            Predicate::Terms { .. } => "terms",
            Predicate::Range { .. } => "range",
            Predicate::Exists { .. } => "exists",
            Predicate::QueryString { .. } => "query_string",
            Predicate::Bool(_) => "bool",
        }
    }

    pub fn to_value(&self) -> Value {
        let body = match self {
            Predicate::Match { field, value }
            | Predicate::MatchPhrase { field, value }
            | Predicate::Term { field, value } => single(field, value.clone()),
            Predicate::Terms { field, values } => single(field, Value::Array(values.clone())),
            Predicate::Range { field, bounds } => single(field, bounds.to_value()),
            Predicate::Exists { field } => json!({ "field": field }),
            Predicate::QueryString {
                default_field,
                query,
            } => json!({ "default_field": default_field, "query": query }),
            Predicate::Bool(inner) => inner.to_value(),
        };
        single(self.kind(), body)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

/// A boolean container: four ordered clause groups plus `minimum_should_match`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoolQuery {
    must: Vec<Predicate>,
    should: Vec<Predicate>,
    filter: Vec<Predicate>,
    must_not: Vec<Predicate>,
    minimum_should_match: Option<Value>,
}

impl BoolQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn group(&self, occur: Occur) -> &[Predicate] {
        match occur {
            Occur::Must => &self.must,
            Occur::Should => &self.should,
            Occur::Filter => &self.filter,
            Occur::MustNot => &self.must_not,
        }
    }

    /// Append `predicate` as the last entry of `occur`.
    pub fn push(&mut self, occur: Occur, predicate: Predicate) {
        let group = match occur {
            Occur::Must => &mut self.must,
            Occur::Should => &mut self.should,
            Occur::Filter => &mut self.filter,
            Occur::MustNot => &mut self.must_not,
        };
        group.push(predicate);
    }

    pub fn minimum_should_match(&self) -> Option<&Value> {
        self.minimum_should_match.as_ref()
    }

    pub fn set_minimum_should_match(&mut self, value: Value) {
        self.minimum_should_match = Some(value);
    }

    pub fn is_empty(&self) -> bool {
        Occur::ALL.iter().all(|o| self.group(*o).is_empty())
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for occur in Occur::ALL {
            let group = self.group(occur);
            if !group.is_empty() {
                map.insert(
                    occur.as_str().to_string(),
                    Value::Array(group.iter().map(Predicate::to_value).collect()),
                );
            }
        }
        if let Some(ref msm) = self.minimum_should_match {
            map.insert("minimum_should_match".to_string(), msm.clone());
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_wire_forms() {
        let m = Predicate::Match {
            field: "status".into(),
            value: json!("active"),
        };
        assert_eq!(m.to_value(), json!({"match": {"status": "active"}}));

        let t = Predicate::Terms {
            field: "tag".into(),
            values: vec![json!("a"), json!("b")],
        };
        assert_eq!(t.to_value(), json!({"terms": {"tag": ["a", "b"]}}));

        let e = Predicate::Exists {
            field: "email".into(),
        };
        assert_eq!(e.to_value(), json!({"exists": {"field": "email"}}));

        let q = Predicate::QueryString {
            default_field: "body".into(),
            query: "rust AND cargo".into(),
        };
        assert_eq!(
            q.to_value(),
            json!({"query_string": {"default_field": "body", "query": "rust AND cargo"}})
        );
    }

    #[test]
    fn test_range_only_emits_set_bounds() {
        let r = Predicate::Range {
            field: "age".into(),
            bounds: Bounds::new().lte(65),
        };
        assert_eq!(r.to_value(), json!({"range": {"age": {"lte": 65}}}));
    }

    #[test]
    fn test_bool_skips_empty_groups() {
        let mut b = BoolQuery::new();
        b.push(
            Occur::MustNot,
            Predicate::Term {
                field: "deleted".into(),
                value: json!(true),
            },
        );
        assert_eq!(
            b.to_value(),
            json!({"must_not": [{"term": {"deleted": true}}]})
        );
        assert!(BoolQuery::new().is_empty());
        assert_eq!(BoolQuery::new().to_value(), json!({}));
    }
}
