//! # Knowledge Harness
//!
//! Extracts human-facing content from source trees into a graph content
//! store with search and per-source extraction bookkeeping.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  Extractors  │──▶│  Controller  │──▶│ ContentStore │
//! │ TSX / Docs   │   │ runs + ledger│   │ SQLite graph │
//! └──────────────┘   └──────────────┘   └──────┬───────┘
//!                                              │
//!                          ┌───────────────────┤
//!                          ▼                   ▼
//!                     ┌──────────┐       ┌──────────┐
//!                     │   CLI    │       │   HTTP   │
//!                     │   (kh)   │       │  (axum)  │
//!                     └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kh init                 # create database
//! kh extract react        # scan components into the store
//! kh search "Welcome"     # substring search
//! kh status               # health and last-run summary
//! kh serve                # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Content records, ledger entries, search types |
//! | [`error`] | Typed errors at the store and extractor boundaries |
//! | [`db`] | Shared connection manager |
//! | [`migrate`] | Schema creation |
//! | [`store`] | `ContentStore` trait with SQLite and in-memory backends |
//! | [`scan`] | Candidate file discovery |
//! | [`extractor`] | `SourceExtractor` trait |
//! | [`component`] | TSX/JSX component extractor |
//! | [`document`] | Markdown/text extractor |
//! | [`controller`] | One extraction run |
//! | [`runs`] | Background runs with status and cancel |
//! | [`search`], [`get`], [`status`] | CLI commands |
//! | [`server`] | HTTP API |

pub mod component;
pub mod config;
pub mod controller;
pub mod db;
pub mod document;
pub mod error;
pub mod extractor;
pub mod get;
pub mod migrate;
pub mod models;
pub mod runs;
pub mod scan;
pub mod search;
pub mod server;
pub mod status;
pub mod store;
