//! Tributary sync core
//!
//! Turns heterogeneous external sources (chat platforms, helpdesk systems,
//! relational databases) into a normalized, hierarchical entity stream and
//! keeps a downstream index incrementally up to date.
//!
//! # Overview
//!
//! - **Entities**: normalized records with provenance breadcrumbs
//!   ([`entities`])
//! - **Connectors**: source adapters that authenticate, paginate and emit a
//!   lazy entity stream ([`connectors`])
//! - **Schema introspection**: runtime-discovered row descriptors for tabular
//!   sources ([`introspect`])
//! - **Change detection**: content-hash comparison against the hash store,
//!   classifying every entity as insert/update/skip ([`sync::change`])
//! - **Orchestration**: one sync job per run — drain the connector, forward
//!   classified operations to the destination, track counters and terminal
//!   status ([`sync`])
//!
//! # Data flow
//!
//! ```text
//! SyncOrchestrator
//!     └─ Connector::run ─► Entity stream ─► ChangeDetector
//!            │                                  │
//!            └─ retrying ApiClient              ├─ insert/update ─► Destination
//!                                               ├─ skip (hash unchanged)
//!                                               └─ end-of-run delete sweep
//! ```

pub mod config;
pub mod connectors;
pub mod entities;
pub mod introspect;
pub mod sync;

pub use tributary_common::{Result, SyncError};
