//! Search index management

use crate::search::config::SearchConfig;
use crate::search::document::{build_artifact_schema, DocumentFields, SearchDocument};
use crate::search::error::{SearchError, SearchResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{AllQuery, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument, Term};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Index statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Total number of documents in the index
    pub total_documents: u64,

    /// Number of segments
    pub num_segments: usize,
}

/// Outcome of a read-modify-write on one document
#[derive(Debug)]
pub enum Change {
    /// Replace (or create) the document
    Put(SearchDocument),
    /// Remove the document
    Delete,
    /// Leave the index untouched
    Keep,
}

/// Owns the tantivy index, its single writer and a reader.
///
/// Every write commits and reloads the reader before returning, so a write
/// is visible to searches that start after it completes.
pub struct IndexManager {
    index: Index,
    fields: DocumentFields,
    writer: Mutex<Option<IndexWriter>>,
    reader: IndexReader,
}

impl IndexManager {
    /// Open the index at `config.index_path`, creating it when absent
    pub async fn open(config: &SearchConfig) -> SearchResult<Self> {
        std::fs::create_dir_all(&config.index_path).map_err(|e| {
            SearchError::IndexInitFailed(format!("failed to create index directory: {}", e))
        })?;

        let index = if Self::index_exists(&config.index_path) {
            Index::open_in_dir(&config.index_path).map_err(|e| {
                SearchError::IndexInitFailed(format!("failed to open existing index: {}", e))
            })?
        } else {
            Index::create_in_dir(&config.index_path, build_artifact_schema()).map_err(|e| {
                SearchError::IndexInitFailed(format!("failed to create new index: {}", e))
            })?
        };

        info!(path = %config.index_path.display(), "search index opened");
        Self::from_index(index, config)
    }

    /// Create a throwaway index held in memory
    pub async fn in_memory(config: &SearchConfig) -> SearchResult<Self> {
        Self::from_index(Index::create_in_ram(build_artifact_schema()), config)
    }

    fn from_index(index: Index, config: &SearchConfig) -> SearchResult<Self> {
        let fields = DocumentFields::new(&index.schema())?;

        let writer: IndexWriter = index
            .writer_with_num_threads(config.indexing_threads.max(1), config.writer_heap_size)
            .map_err(|e| SearchError::IndexInitFailed(format!("failed to create writer: {}", e)))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::IndexInitFailed(format!("failed to create reader: {}", e)))?;

        Ok(Self {
            index,
            fields,
            writer: Mutex::new(Some(writer)),
            reader,
        })
    }

    /// Check if an index exists at the given path
    fn index_exists(path: &Path) -> bool {
        path.join("meta.json").exists()
    }

    pub fn fields(&self) -> &DocumentFields {
        &self.fields
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Snapshot of the last committed state
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// Fetch the document stored under `key`
    pub fn get(&self, key: &str) -> SearchResult<Option<SearchDocument>> {
        self.lookup(&self.searcher(), key)
    }

    fn lookup(&self, searcher: &Searcher, key: &str) -> SearchResult<Option<SearchDocument>> {
        let query = TermQuery::new(
            Term::from_field_text(self.fields.key, key),
            IndexRecordOption::Basic,
        );
        let top = searcher
            .search(&query, &TopDocs::with_limit(1))
            .map_err(SearchError::backend("cannot look up document"))?;

        match top.first() {
            Some((_, address)) => {
                let doc: TantivyDocument = searcher
                    .doc(*address)
                    .map_err(SearchError::backend("cannot load document"))?;
                SearchDocument::from_tantivy_doc(&doc, &self.fields).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Read the document under `key`, let `f` decide what to do with it and
    /// commit the outcome.
    ///
    /// The writer lock is held from the read to the commit, so concurrent
    /// modifications of the same document are serialized. Returns the
    /// document as stored afterwards.
    pub async fn apply<F>(&self, key: &str, f: F) -> SearchResult<Option<SearchDocument>>
    where
        F: FnOnce(Option<SearchDocument>) -> Change,
    {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SearchError::IndexClosed)?;

        let current = self.lookup(&self.searcher(), key)?;
        let change = f(current.clone());

        let stored = match change {
            Change::Keep => return Ok(current),
            Change::Put(document) => {
                if document.key() != key {
                    return Err(SearchError::IndexingFailed(format!(
                        "document {} does not belong under key {}",
                        document.url(),
                        key
                    )));
                }
                writer.delete_term(Term::from_field_text(self.fields.key, key));
                if let Err(e) = writer.add_document(document.to_tantivy_doc(&self.fields)) {
                    Self::rollback(writer);
                    return Err(SearchError::indexing("cannot add document")(e));
                }
                Some(document)
            }
            Change::Delete => {
                if current.is_none() {
                    return Ok(None);
                }
                writer.delete_term(Term::from_field_text(self.fields.key, key));
                None
            }
        };

        if let Err(e) = writer.commit() {
            Self::rollback(writer);
            return Err(SearchError::indexing("cannot commit")(e));
        }
        self.reader
            .reload()
            .map_err(SearchError::indexing("cannot reload reader"))?;

        debug!(key, present = stored.is_some(), "search document committed");
        Ok(stored)
    }

    fn rollback(writer: &mut IndexWriter) {
        if let Err(e) = writer.rollback() {
            warn!(error = %e, "failed to roll back index writer");
        }
    }

    /// Remove every document
    pub async fn clear(&self) -> SearchResult<()> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SearchError::IndexClosed)?;

        writer
            .delete_all_documents()
            .map_err(SearchError::indexing("cannot clear index"))?;
        writer
            .commit()
            .map_err(SearchError::indexing("cannot commit clear"))?;
        self.reader
            .reload()
            .map_err(SearchError::indexing("cannot reload reader"))?;
        Ok(())
    }

    /// Get index statistics
    pub fn get_stats(&self) -> SearchResult<IndexStats> {
        let searcher = self.searcher();

        let total_documents = searcher
            .search(&AllQuery, &Count)
            .map_err(SearchError::backend("cannot count documents"))? as u64;

        Ok(IndexStats {
            total_documents,
            num_segments: searcher.segment_readers().len(),
        })
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }

    /// Release the writer and wait for background merges.
    ///
    /// Searches keep working on the last committed state; writes fail with
    /// [`SearchError::IndexClosed`].
    pub async fn close(&self) -> SearchResult<()> {
        let writer = self.writer.lock().await.take();
        if let Some(writer) = writer {
            writer
                .wait_merging_threads()
                .map_err(SearchError::indexing("cannot wait for merging threads"))?;
            info!("search index closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArtifactKind, ArtifactRef, ReadAcl, ResolvedRef};
    use tempfile::TempDir;

    fn document(name: &str, revision: u32) -> SearchDocument {
        SearchDocument {
            id: ResolvedRef::new(ArtifactRef::new("charmers", "trusty", name, revision), None),
            kind: ArtifactKind::Charm,
            summary: String::new(),
            description: String::new(),
            tags: vec![],
            categories: vec![],
            provides: vec![],
            requires: vec![],
            read_acl: ReadAcl::everyone(),
            total_downloads: 0,
        }
    }

    #[tokio::test]
    async fn test_index_creation_on_disk() {
        let temp_dir = TempDir::new().unwrap();
        let config = SearchConfig {
            index_path: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        let manager = IndexManager::open(&config).await.unwrap();
        assert_eq!(manager.get_stats().unwrap().total_documents, 0);
        manager.close().await.unwrap();

        // reopening finds the existing index
        let manager = IndexManager::open(&config).await.unwrap();
        assert_eq!(manager.get_stats().unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn test_apply_put_replaces_document() {
        let manager = IndexManager::in_memory(&SearchConfig::default()).await.unwrap();
        let doc = document("mysql", 1);
        let key = doc.key();

        manager.apply(&key, |_| Change::Put(doc.clone())).await.unwrap();
        manager
            .apply(&key, |_| Change::Put(document("mysql", 2)))
            .await
            .unwrap();

        assert_eq!(manager.get_stats().unwrap().total_documents, 1);
        assert_eq!(manager.get(&key).unwrap().unwrap().url().revision, 2);
    }

    #[tokio::test]
    async fn test_apply_rejects_foreign_key() {
        let manager = IndexManager::in_memory(&SearchConfig::default()).await.unwrap();
        let result = manager
            .apply("~charmers/trusty/other", |_| Change::Put(document("mysql", 1)))
            .await;
        assert!(matches!(result, Err(SearchError::IndexingFailed(_))));
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let manager = IndexManager::in_memory(&SearchConfig::default()).await.unwrap();
        for name in ["mysql", "wordpress"] {
            let doc = document(name, 1);
            manager.apply(&doc.key(), |_| Change::Put(doc.clone())).await.unwrap();
        }

        let key = document("mysql", 1).key();
        manager.apply(&key, |_| Change::Delete).await.unwrap();
        assert!(manager.get(&key).unwrap().is_none());
        assert_eq!(manager.get_stats().unwrap().total_documents, 1);

        manager.clear().await.unwrap();
        assert_eq!(manager.get_stats().unwrap().total_documents, 0);
    }

    #[tokio::test]
    async fn test_writes_fail_after_close() {
        let manager = IndexManager::in_memory(&SearchConfig::default()).await.unwrap();
        manager.close().await.unwrap();
        assert!(manager.is_closed().await);

        let doc = document("mysql", 1);
        let result = manager.apply(&doc.key(), |_| Change::Put(doc.clone())).await;
        assert!(matches!(result, Err(SearchError::IndexClosed)));
        // reads still work
        assert_eq!(manager.get_stats().unwrap().total_documents, 0);
    }
}
