//! Prometheus exposition after real traffic

mod common;

use charmstore_search::metrics::{gather_metrics, init_metrics};
use charmstore_search::models::{AccessContext, ArtifactRef};
use common::*;

#[tokio::test]
async fn test_search_and_index_metrics_are_exported() {
    init_metrics().unwrap();
    // repeated initialisation is harmless
    init_metrics().unwrap();

    let service = catalogue().await;
    service
        .search(&request(&[("sort", "name")]), &AccessContext::anonymous())
        .await
        .unwrap();
    service
        .search(&request(&[("text", "wordpress")]), &AccessContext::anonymous())
        .await
        .unwrap();
    let varnish: ArtifactRef = "cs:~foo/trusty/varnish-1".parse().unwrap();
    service.update_download_count(&varnish, 2).await.unwrap();

    let output = gather_metrics();
    for expected in [
        "charmstore_search_search_duration_seconds_bucket{ordering=\"sorted\"",
        "charmstore_search_search_duration_seconds_bucket{ordering=\"relevance\"",
        "charmstore_search_index_writes_total{operation=\"index\",status=\"success\"}",
        "charmstore_search_index_writes_total{operation=\"downloads\",status=\"success\"}",
        "charmstore_search_build_info{version=",
    ] {
        assert!(output.contains(expected), "missing {} in\n{}", expected, output);
    }
}
