//! Shared fixtures for integration tests
//!
//! A small catalogue of charms and one bundle, indexed into an in-memory
//! search service.

#![allow(dead_code)]

use async_trait::async_trait;
use charmstore_search::metadata::{ArtifactStore, MetadataError, StoreSection};
use charmstore_search::models::{
    AccessContext, ArtifactKind, ArtifactRecord, ArtifactRef, Popularity, ReadAcl, ResolvedRef,
};
use charmstore_search::search::{SearchConfig, SearchPage, SearchRequest, SearchService};
use serde_json::{json, Value};
use std::collections::HashSet;

pub fn charm(
    id: &str,
    promulgated: Option<u32>,
    summary: &str,
    description: &str,
    provides: &[&str],
    requires: &[&str],
) -> ArtifactRecord {
    let url: ArtifactRef = id.parse().unwrap();
    let mut categories: Vec<String> = url.name.split('-').map(str::to_string).collect();
    categories.push("bar".to_string());

    ArtifactRecord {
        id: ResolvedRef::new(url, promulgated),
        kind: ArtifactKind::Charm,
        summary: summary.to_string(),
        description: description.to_string(),
        tags: vec![],
        categories,
        provides: provides.iter().map(|s| s.to_string()).collect(),
        requires: requires.iter().map(|s| s.to_string()).collect(),
        listed: true,
        popularity: Popularity::default(),
    }
}

pub fn bundle(id: &str, promulgated: Option<u32>) -> ArtifactRecord {
    let url: ArtifactRef = id.parse().unwrap();
    let mut tags: Vec<String> = url.name.split('-').map(str::to_string).collect();
    tags.push("baz".to_string());

    ArtifactRecord {
        id: ResolvedRef::new(url, promulgated),
        kind: ArtifactKind::Bundle,
        summary: String::new(),
        description: String::new(),
        tags,
        categories: vec![],
        provides: vec![],
        requires: vec![],
        listed: true,
        popularity: Popularity::default(),
    }
}

pub fn wordpress() -> ArtifactRecord {
    charm(
        "cs:~charmers/precise/wordpress-23",
        Some(23),
        "Blog engine",
        "A pretty popular blog engine",
        &["http"],
        &["mysql", "varnish"],
    )
}

pub fn mysql() -> ArtifactRecord {
    charm(
        "cs:~openstack-charmers/trusty/mysql-7",
        Some(7),
        "Database engine",
        "A pretty popular database",
        &["mysql"],
        &[],
    )
}

pub fn varnish() -> ArtifactRecord {
    charm(
        "cs:~foo/trusty/varnish-1",
        None,
        "Web accelerator",
        "A pretty popular HTTP cache",
        &["varnish"],
        &[],
    )
}

pub fn riak() -> ArtifactRecord {
    charm(
        "cs:~charmers/trusty/riak-67",
        Some(67),
        "Distributed database",
        "Scalable key value store",
        &["http"],
        &[],
    )
}

/// Requires `http`, provided by wordpress and the restricted riak
pub fn haproxy() -> ArtifactRecord {
    charm(
        "cs:~foo/trusty/haproxy-2",
        None,
        "Load balancer",
        "Fast and reliable load balancing reverse proxy",
        &[],
        &["http"],
    )
}

pub fn wordpress_simple() -> ArtifactRecord {
    bundle("cs:~charmers/bundle/wordpress-simple-4", Some(4))
}

/// Readable by `charmers` and `test-user` only
pub fn riak_acl() -> ReadAcl {
    ReadAcl::new(["charmers", "test-user"])
}

pub fn test_user() -> AccessContext {
    AccessContext::user("bob", ["test-user"])
}

/// Service holding the full catalogue
pub async fn catalogue() -> SearchService {
    let service = SearchService::in_memory(SearchConfig::default())
        .await
        .unwrap();

    for record in [wordpress(), mysql(), varnish(), wordpress_simple()] {
        service
            .index_artifact(&record, ReadAcl::everyone())
            .await
            .unwrap();
    }
    service.index_artifact(&riak(), riak_acl()).await.unwrap();
    service
}

/// Parse a query string the way the HTTP layer does
pub fn request(pairs: &[(&str, &str)]) -> SearchRequest {
    SearchRequest::from_pairs(pairs).unwrap()
}

/// Client-facing ids of a page, in order
pub fn ids(page: &SearchPage) -> Vec<String> {
    page.hits.iter().map(|hit| hit.preferred_url()).collect()
}

pub fn id_set(page: &SearchPage) -> HashSet<String> {
    ids(page).into_iter().collect()
}

pub fn set(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

/// Artifact store answering every section with a small JSON stub, failing
/// for one configured artifact
pub struct StubStore {
    pub failing: Option<ArtifactRef>,
}

#[async_trait]
impl ArtifactStore for StubStore {
    async fn fetch(&self, id: &ArtifactRef, section: StoreSection) -> Result<Value, MetadataError> {
        if self.failing.as_ref() == Some(id) {
            return Err(MetadataError::Store(format!("blob for {} missing", id)));
        }
        Ok(json!({ "Section": section.as_ref(), "Id": id.to_string() }))
    }
}
