//! Full-text search over published charms and bundles, powered by Tantivy
//!
//! - **Request model**: query-string parsing and validation ([`SearchRequest`])
//! - **Index**: one denormalized [`SearchDocument`] per base entity
//! - **Queries**: text or autocomplete, typed filters, read-ACL enforcement
//! - **Ranking**: text relevance boosted by download count and promulgation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │           Search Service                         │
//! ├─────────────────────────────────────────────────┤
//! │  - search()          - related()                │
//! │  - index_artifact()  - update_acl()             │
//! │  - update_download_count() - delete_artifact()  │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │           Index Manager                          │
//! ├─────────────────────────────────────────────────┤
//! │  - Schema                                        │
//! │  - Single writer, read-modify-write per key      │
//! │  - Reader reloaded after every commit            │
//! └─────────────────────────────────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────────────┐
//! │              Tantivy Index                       │
//! ├─────────────────────────────────────────────────┤
//! │  - Inverted Index (name, summary, description)   │
//! │  - Fast Fields (downloads, promulgated)          │
//! │  - Doc Store (full documents)                    │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use charmstore_search::models::AccessContext;
//! use charmstore_search::search::{SearchConfig, SearchRequest, SearchService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let search = SearchService::new(SearchConfig::default()).await?;
//!
//!     let request = SearchRequest::from_pairs(&[("text", "wordpress"), ("limit", "20")])?;
//!     let page = search.search(&request, &AccessContext::anonymous()).await?;
//!     println!("Found {} artifacts", page.total);
//!
//!     Ok(())
//! }
//! ```

mod config;
mod document;
mod error;
mod index;
mod params;
mod query;
mod service;

pub use config::SearchConfig;
pub use document::{build_artifact_schema, names, DocumentFields, SearchDocument};
pub use error::{SearchError, SearchResult};
pub use index::{Change, IndexManager, IndexStats};
pub use params::{FilterField, Filters, ParamError, SearchRequest, SortField, SortKey};
pub use query::{QueryBuilder, Relation, ScoreBoost};
pub use service::{RelatedDocuments, SearchPage, SearchService, StoreEvents};
