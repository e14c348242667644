//! Search configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Search index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Path to the search index directory
    pub index_path: PathBuf,

    /// Index writer heap size in bytes (default: 50MB)
    #[serde(default = "default_writer_heap_size")]
    pub writer_heap_size: usize,

    /// Number of threads for indexing
    #[serde(default = "default_indexing_threads")]
    pub indexing_threads: usize,

    /// Weight of the log-scaled download count in the relevance boost
    #[serde(default = "default_download_boost_weight")]
    pub download_boost_weight: f32,

    /// Score multiplier for promulgated artifacts
    #[serde(default = "default_promulgated_boost")]
    pub promulgated_boost: f32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("./data/search_index"),
            writer_heap_size: default_writer_heap_size(),
            indexing_threads: default_indexing_threads(),
            download_boost_weight: default_download_boost_weight(),
            promulgated_boost: default_promulgated_boost(),
        }
    }
}

fn default_writer_heap_size() -> usize {
    50_000_000 // 50MB
}

fn default_indexing_threads() -> usize {
    1
}

fn default_download_boost_weight() -> f32 {
    0.5
}

fn default_promulgated_boost() -> f32 {
    1.25
}
