//! Per-hit metadata resolution for search results
//!
//! Each `include=<section>` names a [`MetadataProvider`] in the
//! [`MetadataRegistry`]. The [`ResultAssembler`] resolves the requested
//! sections for every hit concurrently and drops hits whose sections fail.

mod assembler;
mod providers;
mod registry;

pub use assembler::{MetadataConfig, ResultAssembler, SearchResponse, SearchResultEntry};
pub use providers::{
    document_providers, ArtifactStore, DocumentProvider, RelatedProvider, StoreSection,
    StoreSectionProvider,
};
pub use registry::{MetadataError, MetadataProvider, MetadataRegistry};
