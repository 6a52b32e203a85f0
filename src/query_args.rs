//! Command-line query flags and their translation into a [`Query`].
//!
//! A single positive predicate becomes a bare leaf query. Anything more, or
//! any `--not-term` / `--should-match`, switches to a bool query:
//!
//! | Flag | Group |
//! |------|-------|
//! | `--match`, `--phrase`, `--query-string` | `must` |
//! | `--term`, `--terms`, `--exists`, `--since`, `--until` | `filter` |
//! | `--not-term` | `must_not` |
//! | `--should-match` | `should` |

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use elasticutils_core::query::{AggsParams, Bounds, Occur, Query, QueryBuilder};
use serde_json::Value;

/// Query flags shared by `query`, `search`, and `scan`.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Full-text match, `FIELD=VALUE`. Repeatable.
    #[arg(long = "match", value_name = "FIELD=VALUE", value_parser = parse_key_val)]
    pub matches: Vec<(String, String)>,

    /// Phrase match, `FIELD=VALUE`. Repeatable.
    #[arg(long = "phrase", value_name = "FIELD=VALUE", value_parser = parse_key_val)]
    pub phrases: Vec<(String, String)>,

    /// Exact term, `FIELD=VALUE`. Repeatable.
    #[arg(long = "term", value_name = "FIELD=VALUE", value_parser = parse_key_val)]
    pub terms: Vec<(String, String)>,

    /// Any of several exact terms, `FIELD=V1,V2,...`. Repeatable.
    #[arg(long = "terms", value_name = "FIELD=V1,V2", value_parser = parse_key_list)]
    pub terms_any: Vec<(String, Vec<String>)>,

    /// Field must be present. Repeatable.
    #[arg(long = "exists", value_name = "FIELD")]
    pub exists: Vec<String>,

    /// Lucene query string against a default field, `FIELD=QUERY`.
    #[arg(long = "query-string", value_name = "FIELD=QUERY", value_parser = parse_key_val)]
    pub query_string: Option<(String, String)>,

    /// Exclude an exact term, `FIELD=VALUE`. Repeatable.
    #[arg(long = "not-term", value_name = "FIELD=VALUE", value_parser = parse_key_val)]
    pub not_terms: Vec<(String, String)>,

    /// Optional full-text match, `FIELD=VALUE`. Repeatable.
    #[arg(long = "should-match", value_name = "FIELD=VALUE", value_parser = parse_key_val)]
    pub should: Vec<(String, String)>,

    /// `minimum_should_match` for the bool query, e.g. `1` or `75%`.
    #[arg(long)]
    pub min_should_match: Option<String>,

    /// Only documents on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub since: Option<String>,

    /// Only documents on or before this date (YYYY-MM-DD).
    #[arg(long)]
    pub until: Option<String>,

    /// Nested aggregation level, `FIELD[:type=..,size=..,sort=..,sort_on=..,interval=..]`.
    /// Each flag nests under the previous one.
    #[arg(long = "agg", value_name = "SPEC", value_parser = parse_agg)]
    pub aggs: Vec<(String, AggsParams)>,

    /// Sort key, `FIELD[:asc|desc]` (default desc). Repeatable.
    #[arg(long = "sort", value_name = "FIELD[:ORDER]")]
    pub sort: Vec<String>,

    /// Number of hits to return.
    #[arg(long)]
    pub size: Option<u64>,

    /// Offset of the first hit.
    #[arg(long)]
    pub from: Option<u64>,

    /// Comma-separated `_source` fields.
    #[arg(long, value_delimiter = ',')]
    pub source: Vec<String>,
}

/// One leaf predicate requested on the command line.
#[derive(Debug, Clone)]
enum Clause {
    Match(String, Value),
    Phrase(String, Value),
    Term(String, Value),
    Terms(String, Vec<Value>),
    Exists(String),
    QueryString(String, String),
    Range(String, Bounds),
}

impl Clause {
    fn apply(&self, qb: &mut QueryBuilder) -> elasticutils_core::Result<()> {
        let res = match self {
            Clause::Match(f, v) => qb.match_query(f, v.clone()),
            Clause::Phrase(f, v) => qb.match_phrase(f, v.clone()),
            Clause::Term(f, v) => qb.term(f, v.clone()),
            Clause::Terms(f, vs) => qb.terms(f, vs.iter().cloned()),
            Clause::Exists(f) => qb.exists(f),
            Clause::QueryString(f, q) => qb.query_string(f, q.clone()),
            Clause::Range(f, b) => qb.range(f, b.clone()),
        };
        res.map(|_| ())
    }
}

impl QueryArgs {
    /// Translate the flags into a builder. `date_field` is the target of
    /// `--since` / `--until`.
    pub fn to_builder(&self, date_field: &str) -> Result<QueryBuilder> {
        let mut clauses: Vec<(Occur, Clause)> = Vec::new();

        for (f, v) in &self.matches {
            clauses.push((Occur::Must, Clause::Match(f.clone(), scalar(v))));
        }
        for (f, v) in &self.phrases {
            clauses.push((Occur::Must, Clause::Phrase(f.clone(), scalar(v))));
        }
        if let Some((f, q)) = &self.query_string {
            clauses.push((Occur::Must, Clause::QueryString(f.clone(), q.clone())));
        }
        for (f, v) in &self.terms {
            clauses.push((Occur::Filter, Clause::Term(f.clone(), scalar(v))));
        }
        for (f, vs) in &self.terms_any {
            let values = vs.iter().map(|v| scalar(v)).collect();
            clauses.push((Occur::Filter, Clause::Terms(f.clone(), values)));
        }
        for f in &self.exists {
            clauses.push((Occur::Filter, Clause::Exists(f.clone())));
        }
        if let Some(bounds) = date_bounds(self.since.as_deref(), self.until.as_deref())? {
            clauses.push((Occur::Filter, Clause::Range(date_field.to_string(), bounds)));
        }
        for (f, v) in &self.not_terms {
            clauses.push((Occur::MustNot, Clause::Term(f.clone(), scalar(v))));
        }
        for (f, v) in &self.should {
            clauses.push((Occur::Should, Clause::Match(f.clone(), scalar(v))));
        }

        let mut qb = QueryBuilder::new();
        let bare = clauses.len() == 1 && matches!(clauses[0].0, Occur::Must | Occur::Filter);
        if bare {
            clauses[0].1.apply(&mut qb)?;
        } else {
            for (occur, clause) in &clauses {
                qb.select(*occur)?;
                clause.apply(&mut qb)?;
            }
        }

        if let Some(ref msm) = self.min_should_match {
            qb.minimum_should_match(scalar(msm))
                .context("--min-should-match needs a bool query")?;
        }
        for (field, params) in &self.aggs {
            qb.aggs(field, params.clone())?;
        }
        for spec in &self.sort {
            let (field, order) = spec.split_once(':').unwrap_or((spec.as_str(), "desc"));
            qb.sort(field, order)?;
        }
        match (self.from, self.size) {
            (Some(from), Some(size)) => {
                qb.from_size(from, size);
            }
            (Some(from), None) => {
                qb.from_size(from, 10);
            }
            (None, Some(size)) => {
                qb.query_size(size);
            }
            (None, None) => {}
        }
        qb.source(self.source.iter().filter(|f| !f.is_empty()));

        Ok(qb)
    }

    pub fn build(&self, date_field: &str) -> Result<Query> {
        Ok(self.to_builder(date_field)?.build())
    }
}

/// Plain decimal numbers and booleans keep their JSON type; anything else,
/// including leading zeros and exponents, stays a string.
pub fn scalar(raw: &str) -> Value {
    if is_plain_number(raw) {
        if !raw.contains('.') {
            if let Ok(i) = raw.parse::<i64>() {
                return Value::from(i);
            }
        } else if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Value::from(f);
            }
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?`
fn is_plain_number(raw: &str) -> bool {
    let digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    let body = raw.strip_prefix('-').unwrap_or(raw);
    let (int, frac) = match body.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (body, None),
    };
    digits(int) && (int == "0" || !int.starts_with('0')) && frac.map_or(true, digits)
}

/// Whole-day bounds: `since` from midnight, `until` through 23:59:59.
fn date_bounds(since: Option<&str>, until: Option<&str>) -> Result<Option<Bounds>> {
    let parse = |flag: &str, s: &str| {
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("--{} expects YYYY-MM-DD, got '{}'", flag, s))
    };
    let since = since.map(|s| parse("since", s)).transpose()?;
    let until = until.map(|s| parse("until", s)).transpose()?;

    if let (Some(s), Some(u)) = (since, until) {
        if s > u {
            bail!("--since {} is after --until {}", s, u);
        }
    }

    let mut bounds = Bounds::new();
    if let Some(s) = since {
        bounds = bounds.gte(format!("{}T00:00:00", s.format("%Y-%m-%d")));
    }
    if let Some(u) = until {
        bounds = bounds.lte(format!("{}T23:59:59", u.format("%Y-%m-%d")));
    }
    Ok(if bounds.is_empty() { None } else { Some(bounds) })
}

/// Parse a `key=value` pair.
pub fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid FIELD=VALUE: no '=' found in '{}'", s))?;
    if key.is_empty() {
        return Err(format!("empty field name in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Parse `key=v1,v2,...`.
pub fn parse_key_list(s: &str) -> Result<(String, Vec<String>), String> {
    let (key, values) = parse_key_val(s)?;
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect();
    if values.is_empty() {
        return Err(format!("no values given in '{}'", s));
    }
    Ok((key, values))
}

/// Parse `field[:key=value,...]` into aggregation parameters.
///
/// Values are validated later by the builder, so `sort=sideways` is
/// accepted here and rejected when the query is built.
pub fn parse_agg(s: &str) -> Result<(String, AggsParams), String> {
    let (field, opts) = match s.split_once(':') {
        Some((f, o)) => (f, o),
        None => (s, ""),
    };
    if field.is_empty() {
        return Err(format!("missing aggregation field in '{}'", s));
    }

    let mut params = AggsParams::new();
    for opt in opts.split(',').filter(|o| !o.is_empty()) {
        let (key, value) = parse_key_val(opt)?;
        params = match key.as_str() {
            "type" => params.aggs_type(value),
            "size" => params.size(
                value
                    .parse()
                    .map_err(|_| format!("aggregation size must be a number, got '{}'", value))?,
            ),
            "sort" => params.sort(value),
            "sort_on" => params.sort_on(value),
            "interval" => params.fixed_interval(value),
            other => {
                return Err(format!(
                    "unknown aggregation option '{}': expected type, size, sort, sort_on, or interval",
                    other
                ))
            }
        };
    }
    Ok((field.to_string(), params))
}
