//! Main search service implementation

use crate::metrics::{record_index_write, SEARCH_DURATION_SECONDS};
use crate::models::{AccessContext, ArtifactRecord, ArtifactRef, ReadAcl};
use crate::search::config::SearchConfig;
use crate::search::document::{names, SearchDocument};
use crate::search::error::{SearchError, SearchResult};
use crate::search::index::{Change, IndexManager, IndexStats};
use crate::search::params::{SearchRequest, SortField, SortKey};
use crate::search::query::{QueryBuilder, Relation, ScoreBoost};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tantivy::collector::{Count, DocSetCollector, TopDocs};
use tantivy::query::Query;
use tantivy::{DocAddress, DocId, Score, Searcher, SegmentReader, TantivyDocument};
use tracing::{debug, info, instrument};

/// One page of search results
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Hits in the requested window, in result order
    pub hits: Vec<SearchDocument>,

    /// Number of matches before pagination
    pub total: usize,
}

/// Charms related to one charm through shared interfaces.
///
/// `provides` maps each interface the charm requires to the charms providing
/// it; `requires` maps each interface the charm provides to the charms
/// requiring it.
#[derive(Debug, Clone, Default)]
pub struct RelatedDocuments {
    pub provides: BTreeMap<String, Vec<SearchDocument>>,
    pub requires: BTreeMap<String, Vec<SearchDocument>>,
}

/// Hooks the primary artifact store calls when canonical state changes
#[async_trait]
pub trait StoreEvents: Send + Sync {
    async fn on_artifact_published(
        &self,
        record: &ArtifactRecord,
        acl: &ReadAcl,
    ) -> SearchResult<()>;

    async fn on_acl_changed(&self, id: &ArtifactRef, acl: &ReadAcl) -> SearchResult<()>;

    async fn on_download_recorded(&self, id: &ArtifactRef) -> SearchResult<()>;

    async fn on_artifact_removed(&self, id: &ArtifactRef) -> SearchResult<()>;
}

/// Main search service
pub struct SearchService {
    index_manager: Arc<IndexManager>,
    boost: ScoreBoost,
}

impl SearchService {
    /// Open (or create) the on-disk index described by `config`
    pub async fn new(config: SearchConfig) -> SearchResult<Self> {
        let index_manager = Arc::new(IndexManager::open(&config).await?);
        Ok(Self::with_index(index_manager, &config))
    }

    /// Service over a fresh in-memory index
    pub async fn in_memory(config: SearchConfig) -> SearchResult<Self> {
        let index_manager = Arc::new(IndexManager::in_memory(&config).await?);
        Ok(Self::with_index(index_manager, &config))
    }

    pub fn with_index(index_manager: Arc<IndexManager>, config: &SearchConfig) -> Self {
        Self {
            index_manager,
            boost: ScoreBoost::new(config.download_boost_weight, config.promulgated_boost),
        }
    }

    pub fn index_manager(&self) -> &Arc<IndexManager> {
        &self.index_manager
    }

    /// Run a validated request with the requester's access rights
    #[instrument(skip(self, request, access), fields(text = %request.text))]
    pub async fn search(
        &self,
        request: &SearchRequest,
        access: &AccessContext,
    ) -> SearchResult<SearchPage> {
        let ordering = if request.sort.is_empty() {
            "relevance"
        } else {
            "sorted"
        };
        let timer = SEARCH_DURATION_SECONDS
            .with_label_values(&[ordering])
            .start_timer();

        let searcher = self.index_manager.searcher();
        let fields = *self.index_manager.fields();
        let query = QueryBuilder::new(self.index_manager.index(), &fields).build(request, access)?;

        let total = searcher
            .search(query.as_ref(), &Count)
            .map_err(SearchError::backend("cannot count matches"))?;

        let hits = if request.sort.is_empty() {
            self.ranked(&searcher, query.as_ref(), request, total)?
        } else {
            self.sorted(&searcher, query.as_ref(), request)?
        };

        timer.observe_duration();
        debug!(total, returned = hits.len(), "search executed");

        Ok(SearchPage { hits, total })
    }

    /// Relevance order: text score adjusted by popularity
    fn ranked(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        request: &SearchRequest,
        total: usize,
    ) -> SearchResult<Vec<SearchDocument>> {
        let remaining = total.saturating_sub(request.skip);
        let window = match request.limit {
            0 => remaining,
            limit => limit.min(remaining),
        };
        if window == 0 {
            return Ok(Vec::new());
        }

        let boost = self.boost;
        let collector = TopDocs::with_limit(window)
            .and_offset(request.skip)
            .tweak_score(move |segment: &SegmentReader| {
                let downloads = segment.fast_fields().u64(names::TOTAL_DOWNLOADS).ok();
                let promulgated = segment.fast_fields().u64(names::PROMULGATED).ok();
                move |doc: DocId, score: Score| {
                    let downloads = downloads
                        .as_ref()
                        .and_then(|column| column.first(doc))
                        .unwrap_or(0);
                    let promulgated = promulgated
                        .as_ref()
                        .and_then(|column| column.first(doc))
                        .unwrap_or(0)
                        == 1;
                    boost.apply(score, downloads, promulgated)
                }
            });

        let top_docs = searcher
            .search(query, &collector)
            .map_err(SearchError::backend("cannot rank matches"))?;

        top_docs
            .into_iter()
            .map(|(_, address)| self.load(searcher, address))
            .collect()
    }

    /// Explicit order: every match is loaded, sorted, then paginated
    fn sorted(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        request: &SearchRequest,
    ) -> SearchResult<Vec<SearchDocument>> {
        let addresses = searcher
            .search(query, &DocSetCollector)
            .map_err(SearchError::backend("cannot collect matches"))?;

        let mut documents = addresses
            .into_iter()
            .map(|address| self.load(searcher, address))
            .collect::<SearchResult<Vec<_>>>()?;

        documents.sort_by(|a, b| compare(a, b, &request.sort));

        let window = documents.into_iter().skip(request.skip);
        Ok(match request.limit {
            0 => window.collect(),
            limit => window.take(limit).collect(),
        })
    }

    fn load(&self, searcher: &Searcher, address: DocAddress) -> SearchResult<SearchDocument> {
        let doc: TantivyDocument = searcher
            .doc(address)
            .map_err(SearchError::backend("cannot load document"))?;
        SearchDocument::from_tantivy_doc(&doc, self.index_manager.fields())
            .map_err(SearchError::backend("cannot decode document"))
    }

    /// Charms sharing interfaces with `document`, filtered by `access`
    pub fn related(
        &self,
        document: &SearchDocument,
        access: &AccessContext,
    ) -> SearchResult<RelatedDocuments> {
        let searcher = self.index_manager.searcher();
        let fields = *self.index_manager.fields();
        let builder = QueryBuilder::new(self.index_manager.index(), &fields);

        let mut related = RelatedDocuments::default();
        for interface in &document.requires {
            let query = builder.interface_query(
                Relation::Provides,
                std::slice::from_ref(interface),
                access,
            );
            let peers = self.peers(&searcher, query.as_ref(), document)?;
            if !peers.is_empty() {
                related.provides.insert(interface.clone(), peers);
            }
        }
        for interface in &document.provides {
            let query = builder.interface_query(
                Relation::Requires,
                std::slice::from_ref(interface),
                access,
            );
            let peers = self.peers(&searcher, query.as_ref(), document)?;
            if !peers.is_empty() {
                related.requires.insert(interface.clone(), peers);
            }
        }
        Ok(related)
    }

    fn peers(
        &self,
        searcher: &Searcher,
        query: &dyn Query,
        document: &SearchDocument,
    ) -> SearchResult<Vec<SearchDocument>> {
        let addresses = searcher
            .search(query, &DocSetCollector)
            .map_err(SearchError::backend("cannot collect related documents"))?;

        let key = document.key();
        let mut peers = Vec::new();
        for address in addresses {
            let peer = self.load(searcher, address)?;
            if peer.key() != key {
                peers.push(peer);
            }
        }
        peers.sort_by(|a, b| a.url().cmp(b.url()));
        Ok(peers)
    }

    /// Indexed document for the base entity of `id`
    pub fn get(&self, id: &ArtifactRef) -> SearchResult<Option<SearchDocument>> {
        self.index_manager.get(&id.base_key())
    }

    /// Build the document for `record` and upsert it.
    ///
    /// Unlisted records remove the document. A record older than the indexed
    /// revision is superseded and ignored. The download counter never drops
    /// below the value already stored.
    #[instrument(skip(self, record, acl), fields(id = %record.id.url))]
    pub async fn index_artifact(&self, record: &ArtifactRecord, acl: ReadAcl) -> SearchResult<()> {
        let key = record.id.url.base_key();
        let result = self
            .index_manager
            .apply(&key, |current| {
                if !record.listed {
                    debug!("artifact unlisted, removing from search");
                    return Change::Delete;
                }
                if let Some(current) = &current {
                    if current.url().revision > record.id.url.revision {
                        debug!(indexed = %current.url(), "superseded revision not indexed");
                        return Change::Keep;
                    }
                }

                let mut document = SearchDocument::from_record(record, acl);
                if let Some(current) = current {
                    document.total_downloads = document.total_downloads.max(current.total_downloads);
                }
                Change::Put(document)
            })
            .await;

        record_index_write("index", &result);
        result.map(|_| ())
    }

    /// Replace the read ACL of an indexed document
    #[instrument(skip(self, acl), fields(id = %id))]
    pub async fn update_acl(&self, id: &ArtifactRef, acl: ReadAcl) -> SearchResult<()> {
        let result = self
            .index_manager
            .apply(&id.base_key(), |current| match current {
                Some(document) if document.read_acl != acl => Change::Put(SearchDocument {
                    read_acl: acl,
                    ..document
                }),
                Some(_) => Change::Keep,
                None => {
                    debug!("no indexed document for ACL change");
                    Change::Keep
                }
            })
            .await;

        record_index_write("acl", &result);
        result.map(|_| ())
    }

    /// Add `delta` downloads to an indexed document
    #[instrument(skip(self), fields(id = %id))]
    pub async fn update_download_count(&self, id: &ArtifactRef, delta: u64) -> SearchResult<()> {
        let result = self
            .index_manager
            .apply(&id.base_key(), |current| match current {
                Some(document) if delta > 0 => Change::Put(SearchDocument {
                    total_downloads: document.total_downloads.saturating_add(delta),
                    ..document
                }),
                _ => Change::Keep,
            })
            .await;

        record_index_write("downloads", &result);
        result.map(|_| ())
    }

    /// Raise the download counter to `total`; lower values are ignored
    #[instrument(skip(self), fields(id = %id))]
    pub async fn set_download_count(&self, id: &ArtifactRef, total: u64) -> SearchResult<()> {
        let result = self
            .index_manager
            .apply(&id.base_key(), |current| match current {
                Some(document) if total > document.total_downloads => {
                    Change::Put(SearchDocument {
                        total_downloads: total,
                        ..document
                    })
                }
                _ => Change::Keep,
            })
            .await;

        record_index_write("downloads", &result);
        result.map(|_| ())
    }

    /// Remove the document for the base entity of `id`
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete_artifact(&self, id: &ArtifactRef) -> SearchResult<()> {
        let result = self
            .index_manager
            .apply(&id.base_key(), |_| Change::Delete)
            .await;

        record_index_write("delete", &result);
        result.map(|_| ())
    }

    /// Get index statistics
    pub fn get_stats(&self) -> SearchResult<IndexStats> {
        self.index_manager.get_stats()
    }

    /// Close the underlying index
    pub async fn close(&self) -> SearchResult<()> {
        info!("closing search service");
        self.index_manager.close().await
    }
}

#[async_trait]
impl StoreEvents for SearchService {
    async fn on_artifact_published(
        &self,
        record: &ArtifactRecord,
        acl: &ReadAcl,
    ) -> SearchResult<()> {
        self.index_artifact(record, acl.clone()).await
    }

    async fn on_acl_changed(&self, id: &ArtifactRef, acl: &ReadAcl) -> SearchResult<()> {
        self.update_acl(id, acl.clone()).await
    }

    async fn on_download_recorded(&self, id: &ArtifactRef) -> SearchResult<()> {
        self.update_download_count(id, 1).await
    }

    async fn on_artifact_removed(&self, id: &ArtifactRef) -> SearchResult<()> {
        self.delete_artifact(id).await
    }
}

/// Compare by each sort key in turn, then by artifact reference
fn compare(a: &SearchDocument, b: &SearchDocument, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let ordering = match key.field {
                SortField::Name => a.name().cmp(b.name()),
                SortField::Owner => a.owner().cmp(b.owner()),
                SortField::Series => a.series().cmp(b.series()),
                SortField::Downloads => a.total_downloads.cmp(&b.total_downloads),
            };
            if key.descending {
                ordering.reverse()
            } else {
                ordering
            }
        })
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| a.url().cmp(b.url()))
}
