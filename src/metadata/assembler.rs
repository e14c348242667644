use crate::metadata::registry::{MetadataError, MetadataRegistry};
use crate::metrics::METADATA_FAILURES_TOTAL;
use crate::models::AccessContext;
use crate::search::{SearchDocument, SearchPage};
use futures::future::{self, join_all};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Limits applied while resolving metadata sections
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Hits resolved concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Deadline for a single provider call (milliseconds)
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
}

impl MetadataConfig {
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            provider_timeout_ms: default_provider_timeout_ms(),
        }
    }
}

fn default_max_concurrent() -> usize {
    8
}

fn default_provider_timeout_ms() -> u64 {
    5000
}

/// Response body of `GET /search`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResultEntry>,
    pub total: usize,
}

/// One hit with its resolved metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SearchResultEntry {
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

/// Turns a page of hits into the response body, resolving `include`
/// sections per hit.
///
/// A hit whose sections cannot all be resolved is dropped and logged; the
/// reported total is left untouched.
pub struct ResultAssembler {
    registry: Arc<MetadataRegistry>,
    config: MetadataConfig,
}

impl ResultAssembler {
    pub fn new(registry: Arc<MetadataRegistry>, config: MetadataConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    pub async fn assemble(
        &self,
        page: SearchPage,
        include: &[String],
        access: &AccessContext,
    ) -> SearchResponse {
        let results: Vec<SearchResultEntry> = stream::iter(page.hits)
            .map(|document| self.resolve_hit(document, include, access))
            .buffered(self.config.max_concurrent.max(1))
            .filter_map(future::ready)
            .collect()
            .await;

        SearchResponse {
            results,
            total: page.total,
        }
    }

    async fn resolve_hit(
        &self,
        document: SearchDocument,
        include: &[String],
        access: &AccessContext,
    ) -> Option<SearchResultEntry> {
        let id = document.preferred_url();
        let sections = join_all(
            include
                .iter()
                .map(|name| self.resolve_section(&document, name, access)),
        )
        .await;

        let mut meta = BTreeMap::new();
        for (name, section) in include.iter().zip(sections) {
            match section {
                Ok(Some(value)) => {
                    meta.insert(name.clone(), value);
                }
                Ok(None) => debug!(id = %id, section = %name, "metadata section not applicable"),
                Err(err) => {
                    METADATA_FAILURES_TOTAL.with_label_values(&[name.as_str()]).inc();
                    warn!(id = %id, section = %name, "cannot retrieve metadata for {}: {}", id, err);
                    return None;
                }
            }
        }

        Some(SearchResultEntry { id, meta })
    }

    async fn resolve_section(
        &self,
        document: &SearchDocument,
        name: &str,
        access: &AccessContext,
    ) -> Result<Option<Value>, MetadataError> {
        let provider = self
            .registry
            .get(name)
            .ok_or_else(|| MetadataError::UnknownSection(name.to_string()))?;

        let deadline = self.config.provider_timeout();
        timeout(deadline, provider.resolve(document, access))
            .await
            .map_err(|_| MetadataError::Timeout(deadline))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataProvider;
    use crate::models::{ArtifactKind, ArtifactRef, ReadAcl, ResolvedRef};
    use async_trait::async_trait;
    use serde_json::json;

    /// Echoes the name, fails for "broken", hangs for "slow"
    struct Probe;

    #[async_trait]
    impl MetadataProvider for Probe {
        fn name(&self) -> &str {
            "probe"
        }

        async fn resolve(
            &self,
            document: &SearchDocument,
            _access: &AccessContext,
        ) -> Result<Option<Value>, MetadataError> {
            match document.name() {
                "broken" => Err(MetadataError::NotFound("blob".to_string())),
                "slow" => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(None)
                }
                "bundle" => Ok(None),
                name => Ok(Some(json!(name))),
            }
        }
    }

    fn document(name: &str) -> SearchDocument {
        SearchDocument {
            id: ResolvedRef::new(ArtifactRef::new("foo", "trusty", name, 1), None),
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

    fn assembler() -> ResultAssembler {
        let registry = MetadataRegistry::new().with(Arc::new(Probe));
        ResultAssembler::new(
            Arc::new(registry),
            MetadataConfig {
                max_concurrent: 2,
                provider_timeout_ms: 50,
            },
        )
    }

    fn page(names: &[&str]) -> SearchPage {
        SearchPage {
            hits: names.iter().map(|n| document(n)).collect(),
            total: names.len(),
        }
    }

    #[tokio::test]
    async fn test_failing_hits_are_dropped() {
        let include = vec!["probe".to_string()];
        let response = assembler()
            .assemble(
                page(&["mysql", "broken", "slow", "wordpress"]),
                &include,
                &AccessContext::anonymous(),
            )
            .await;

        assert_eq!(response.total, 4);
        let ids: Vec<_> = response.results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["cs:~foo/trusty/mysql-1", "cs:~foo/trusty/wordpress-1"]);
        assert_eq!(response.results[0].meta["probe"], json!("mysql"));
    }

    #[tokio::test]
    async fn test_inapplicable_section_is_omitted() {
        let include = vec!["probe".to_string()];
        let response = assembler()
            .assemble(page(&["bundle"]), &include, &AccessContext::anonymous())
            .await;

        assert_eq!(response.results.len(), 1);
        assert!(response.results[0].meta.is_empty());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"Results": [{"Id": "cs:~foo/trusty/bundle-1"}], "Total": 1})
        );
    }

    #[tokio::test]
    async fn test_no_include_keeps_every_hit() {
        let response = assembler()
            .assemble(page(&["broken", "slow"]), &[], &AccessContext::anonymous())
            .await;
        assert_eq!(response.results.len(), 2);
    }
}
