//! Error taxonomy shared by the query builder and the scanner.
//!
//! Builder misuse is reported at the offending call, so a malformed query
//! never reaches the wire. Transport, retrieval, and snapshot failures come
//! from round-trips to the engine.

use thiserror::Error;

/// Errors produced by `elasticutils-core`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A bare predicate was combined with another predicate or a clause group.
    #[error("structural conflict: {0}")]
    StructuralConflict(String),

    /// `range` was called without a lower or an upper bound.
    #[error("range on '{field}' needs at least one of gte or lte")]
    MissingBound {
        /// Field the range was requested on.
        field: String,
    },

    /// `add_bool` received a sub-query without a boolean root.
    #[error("sub-query must contain a bool query")]
    MissingBool,

    /// `add_bool` was called on a builder that is not in boolean mode.
    #[error("cannot nest a bool query outside of a clause group")]
    CannotNest,

    /// An enumerated parameter carried an unsupported value.
    #[error("invalid {name} '{value}': expected one of {expected}")]
    InvalidParameter {
        /// Parameter name, e.g. `sort` or `aggs_type`.
        name: &'static str,
        /// The rejected value.
        value: String,
        /// Human readable list of accepted values.
        expected: &'static str,
    },

    /// The operation only applies to a boolean query.
    #[error("{0} is only applicable to a bool query")]
    NotApplicable(&'static str),

    /// The transport could not complete the round-trip.
    #[error("transport error: {0}")]
    Transport(String),

    /// A page fetch returned a non-success status.
    #[error("retrieval failed with status {status}: {body}")]
    Retrieval {
        /// HTTP status code returned by the engine.
        status: u16,
        /// Response body, verbatim.
        body: serde_json::Value,
    },

    /// Opening or releasing a point-in-time snapshot failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The engine answered with a body the scanner cannot interpret.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(name: &'static str, value: impl Into<String>, expected: &'static str) -> Self {
        Error::InvalidParameter {
            name,
            value: value.into(),
            expected,
        }
    }

    /// True for errors raised by builder misuse rather than I/O.
    pub fn is_builder_error(&self) -> bool {
        matches!(
            self,
            Error::StructuralConflict(_)
                | Error::MissingBound { .. }
                | Error::MissingBool
                | Error::CannotNest
                | Error::InvalidParameter { .. }
                | Error::NotApplicable(_)
        )
    }
}
