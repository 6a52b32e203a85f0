//! # elasticutils core
//!
//! Transport-agnostic logic for talking to an Elasticsearch-like engine:
//! a fail-fast query builder, endpoint URL helpers, and point-in-time
//! paginated scanning with `search_after` cursors.
//!
//! This crate contains no HTTP client, filesystem I/O, or CLI code. Anything
//! that implements [`transport::Transport`] can drive the scanner; the
//! in-memory engine in [`transport::memory`] serves tests.

pub mod error;
pub mod query;
pub mod scan;
pub mod transport;
pub mod urls;

pub use error::{Error, Result};
pub use query::{Query, QueryBuilder};
pub use scan::{Cursor, PaginatedScanner, PointInTime, ScanOptions, ScanState};
pub use transport::{Method, Response, Transport};
