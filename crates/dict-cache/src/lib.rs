//! Refreshable field-dictionary cache.
//!
//! A dictionary schema (XML) is fetched from a local archive or a remote git
//! repository, parsed into a `longname -> FieldRecord` table and published
//! through an atomic snapshot swap. A background scheduler refreshes it on a
//! fixed interval; readers never block on a refresh and never observe a
//! partially built table.
//!
//! ```text
//! DictLoader ──fetch_raw──> parse_schema ──DictionaryTable──> CacheStore::swap
//!      ^                                                          │
//!      └──────────── RefreshScheduler (tick / manual) ────────────┘
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod model;
pub mod parser;
pub mod resolver;
pub mod scheduler;
pub mod service;
pub mod store;

pub use config::{DictConfig, LoaderKind};
pub use error::{DictError, ErrorKind, Result};
pub use loader::{build_loader, DictLoader};
pub use model::{DictionaryTable, FieldRecord};
pub use parser::parse_schema;
pub use resolver::{MavenRepoResolver, RepoPathResolver, RepoPathSource};
pub use scheduler::{
    LoadReport, RefreshOutcome, RefreshPhase, RefreshPolicy, RefreshScheduler, RefreshStatus,
    RefreshTrigger, SkipReason,
};
pub use service::{DictQuery, DictService, LoaderHealth};
pub use store::{CacheStats, CacheStore};
