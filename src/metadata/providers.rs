use crate::metadata::registry::{MetadataError, MetadataProvider, MetadataRegistry};
use crate::models::{AccessContext, ArtifactKind, ArtifactRef};
use crate::search::{SearchDocument, SearchService};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Provider computed from the indexed document alone
pub struct DocumentProvider {
    name: &'static str,
    extract: fn(&SearchDocument) -> Option<Value>,
}

impl DocumentProvider {
    pub fn new(name: &'static str, extract: fn(&SearchDocument) -> Option<Value>) -> Self {
        Self { name, extract }
    }
}

#[async_trait]
impl MetadataProvider for DocumentProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn resolve(
        &self,
        document: &SearchDocument,
        _access: &AccessContext,
    ) -> Result<Option<Value>, MetadataError> {
        Ok((self.extract)(document))
    }
}

/// Owner shown in ids; promulgated ids have none
fn public_user(document: &SearchDocument) -> Option<&str> {
    (!document.id.is_promulgated()).then(|| document.owner())
}

/// Revision shown in ids
fn public_revision(document: &SearchDocument) -> u32 {
    document
        .id
        .promulgated_revision
        .unwrap_or(document.url().revision)
}

fn id_section(document: &SearchDocument) -> Option<Value> {
    let mut section = Map::new();
    section.insert("Id".into(), json!(document.preferred_url()));
    if let Some(user) = public_user(document) {
        section.insert("User".into(), json!(user));
    }
    section.insert("Series".into(), json!(document.series()));
    section.insert("Name".into(), json!(document.name()));
    section.insert("Revision".into(), json!(public_revision(document)));
    Some(Value::Object(section))
}

fn tags_section(document: &SearchDocument) -> Option<Value> {
    let mut tags: Vec<&str> = Vec::new();
    for tag in document.tags.iter().chain(&document.categories) {
        if !tags.contains(&tag.as_str()) {
            tags.push(tag);
        }
    }
    Some(json!({ "Tags": tags }))
}

/// Sections derived from the search document
pub fn document_providers() -> Vec<DocumentProvider> {
    vec![
        DocumentProvider::new("id", id_section),
        DocumentProvider::new("id-name", |d| Some(json!({ "Name": d.name() }))),
        DocumentProvider::new("id-user", |d| Some(json!({ "User": public_user(d) }))),
        DocumentProvider::new("id-series", |d| Some(json!({ "Series": d.series() }))),
        DocumentProvider::new("id-revision", |d| {
            Some(json!({ "Revision": public_revision(d) }))
        }),
        DocumentProvider::new("promulgated", |d| {
            Some(json!({ "Promulgated": d.id.is_promulgated() }))
        }),
        DocumentProvider::new("stats", |d| {
            Some(json!({ "ArchiveDownloadCount": d.total_downloads }))
        }),
        DocumentProvider::new("tags", tags_section),
    ]
}

/// `charm-related`: charms sharing interfaces with a charm, visible to the
/// requester
pub struct RelatedProvider {
    search: Arc<SearchService>,
}

impl RelatedProvider {
    pub fn new(search: Arc<SearchService>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl MetadataProvider for RelatedProvider {
    fn name(&self) -> &str {
        "charm-related"
    }

    async fn resolve(
        &self,
        document: &SearchDocument,
        access: &AccessContext,
    ) -> Result<Option<Value>, MetadataError> {
        if document.kind != ArtifactKind::Charm {
            return Ok(None);
        }

        let related = self.search.related(document, access)?;
        let ids = |groups: BTreeMap<String, Vec<SearchDocument>>| -> Map<String, Value> {
            groups
                .into_iter()
                .map(|(interface, peers)| {
                    let peers: Vec<Value> = peers
                        .iter()
                        .map(|peer| json!({ "Id": peer.preferred_url() }))
                        .collect();
                    (interface, Value::Array(peers))
                })
                .collect()
        };

        let mut section = Map::new();
        let provides = ids(related.provides);
        if !provides.is_empty() {
            section.insert("Provides".into(), Value::Object(provides));
        }
        let requires = ids(related.requires);
        if !requires.is_empty() {
            section.insert("Requires".into(), Value::Object(requires));
        }
        Ok(Some(Value::Object(section)))
    }
}

/// Metadata sections read from the artifact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, AsRefStr, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum StoreSection {
    ArchiveSize,
    Manifest,
    CharmMetadata,
    CharmConfig,
    CharmActions,
    BundleMetadata,
    BundleUnitCount,
    BundleMachineCount,
}

impl StoreSection {
    /// Whether the section exists for artifacts of `kind`
    pub fn applies_to(&self, kind: ArtifactKind) -> bool {
        match self {
            StoreSection::ArchiveSize | StoreSection::Manifest => true,
            StoreSection::CharmMetadata
            | StoreSection::CharmConfig
            | StoreSection::CharmActions => kind == ArtifactKind::Charm,
            StoreSection::BundleMetadata
            | StoreSection::BundleUnitCount
            | StoreSection::BundleMachineCount => kind == ArtifactKind::Bundle,
        }
    }
}

/// Canonical artifact store and blob storage, as seen by metadata providers
#[async_trait]
pub trait ArtifactStore: Send + Sync + 'static {
    /// Fetch one section for an artifact revision
    async fn fetch(&self, id: &ArtifactRef, section: StoreSection) -> Result<Value, MetadataError>;
}

/// Provider delegating one [`StoreSection`] to the artifact store
pub struct StoreSectionProvider {
    section: StoreSection,
    store: Arc<dyn ArtifactStore>,
}

impl StoreSectionProvider {
    pub fn new(section: StoreSection, store: Arc<dyn ArtifactStore>) -> Self {
        Self { section, store }
    }
}

#[async_trait]
impl MetadataProvider for StoreSectionProvider {
    fn name(&self) -> &str {
        self.section.as_ref()
    }

    async fn resolve(
        &self,
        document: &SearchDocument,
        _access: &AccessContext,
    ) -> Result<Option<Value>, MetadataError> {
        if !self.section.applies_to(document.kind) {
            return Ok(None);
        }
        self.store.fetch(document.url(), self.section).await.map(Some)
    }
}

impl MetadataRegistry {
    /// Registry with the document-derived sections and `charm-related`
    pub fn with_builtins(search: Arc<SearchService>) -> Self {
        let mut registry = Self::new();
        for provider in document_providers() {
            registry.register(Arc::new(provider));
        }
        registry.register(Arc::new(RelatedProvider::new(search)));
        registry
    }

    /// Add a provider for every [`StoreSection`]
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        for section in StoreSection::iter() {
            self.register(Arc::new(StoreSectionProvider::new(section, Arc::clone(&store))));
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ReadAcl, ResolvedRef};

    fn document(promulgated: Option<u32>) -> SearchDocument {
        SearchDocument {
            id: ResolvedRef::new(
                ArtifactRef::new("charmers", "precise", "wordpress", 23),
                promulgated,
            ),
            kind: ArtifactKind::Charm,
            summary: String::new(),
            description: String::new(),
            tags: vec!["wordpress".to_string()],
            categories: vec!["wordpress".to_string(), "bar".to_string()],
            provides: vec![],
            requires: vec![],
            read_acl: ReadAcl::everyone(),
            total_downloads: 4,
        }
    }

    async fn resolve(name: &str, document: &SearchDocument) -> Option<Value> {
        let provider = document_providers()
            .into_iter()
            .find(|p| p.name == name)
            .unwrap();
        provider
            .resolve(document, &AccessContext::anonymous())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_id_sections() {
        let promulgated = document(Some(3));
        assert_eq!(
            resolve("id", &promulgated).await.unwrap(),
            json!({"Id": "cs:precise/wordpress-3", "Series": "precise", "Name": "wordpress", "Revision": 3})
        );

        let owned = document(None);
        assert_eq!(
            resolve("id", &owned).await.unwrap(),
            json!({
                "Id": "cs:~charmers/precise/wordpress-23",
                "User": "charmers",
                "Series": "precise",
                "Name": "wordpress",
                "Revision": 23
            })
        );
        assert_eq!(
            resolve("id-user", &owned).await.unwrap(),
            json!({"User": "charmers"})
        );
    }

    #[tokio::test]
    async fn test_stats_and_tags() {
        let doc = document(None);
        assert_eq!(
            resolve("stats", &doc).await.unwrap(),
            json!({"ArchiveDownloadCount": 4})
        );
        assert_eq!(
            resolve("tags", &doc).await.unwrap(),
            json!({"Tags": ["wordpress", "bar"]})
        );
    }

    #[test]
    fn test_store_sections() {
        assert_eq!(StoreSection::ArchiveSize.as_ref(), "archive-size");
        assert_eq!(
            "bundle-unit-count".parse::<StoreSection>().unwrap(),
            StoreSection::BundleUnitCount
        );
        assert!(StoreSection::CharmConfig.applies_to(ArtifactKind::Charm));
        assert!(!StoreSection::CharmConfig.applies_to(ArtifactKind::Bundle));
        assert!(StoreSection::Manifest.applies_to(ArtifactKind::Bundle));
    }
}
