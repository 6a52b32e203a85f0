//! # elasticutils
//!
//! Query building and point-in-time scanning for Elasticsearch-compatible
//! clusters.
//!
//! The query builder, scanner, URL helpers, and the [`Transport`] seam live
//! in `elasticutils-core`. This crate adds what a working client needs on
//! top: a `reqwest` transport with Basic auth, TOML configuration, logging,
//! and the `esu` command line.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────────┐   ┌───────────────┐
//! │  QueryArgs   │──▶│  QueryBuilder     │──▶│    Query      │
//! │  (CLI flags) │   │  (core)           │   │    (core)     │
//! └──────────────┘   └───────────────────┘   └──────┬────────┘
//!                                                   │
//!                      ┌────────────────────────────┤
//!                      ▼                            ▼
//!              ┌────────────────┐          ┌──────────────────┐
//!              │ search (once)  │          │ PaginatedScanner │
//!              └───────┬────────┘          │ PIT+search_after │
//!                      │                   └────────┬─────────┘
//!                      ▼                            ▼
//!              ┌─────────────────────────────────────────────┐
//!              │  ElasticsearchClient ── HttpTransport       │
//!              └─────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`client`] | HTTP transport and index/document calls |
//! | [`query_args`] | Command-line flags to queries |
//! | [`search`] | One-shot search |
//! | [`scan_cmd`] | NDJSON export through point-in-time snapshots |
//! | [`pit`] | Snapshot management |
//! | [`get`] | Single-document get, put, and update |
//! | [`index_cmd`] | Index existence, creation, deletion |
//! | [`progress`] | Scan progress on stderr |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! [`Transport`]: elasticutils_core::Transport

pub mod client;
pub mod config;
pub mod get;
pub mod index_cmd;
pub mod logging;
pub mod pit;
pub mod progress;
pub mod query_args;
pub mod scan_cmd;
pub mod search;

pub use client::{ElasticsearchClient, HttpTransport};
