//! Identity service client against a mock HTTP server

use charmstore_search::auth::{BasicAuth, HttpIdentityClient, IdentityClient, IdentityError};
use charmstore_search::config::IdentityConfig;

fn config(api_url: String) -> IdentityConfig {
    IdentityConfig {
        api_url,
        username: "agent".to_string(),
        password: "agent-password".to_string(),
        timeout_secs: 5,
        group_cache_ttl_secs: 60,
        group_cache_capacity: 100,
    }
}

#[tokio::test]
async fn test_resolve_groups() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/v1/u/bob/groups")
        .match_header(
            "authorization",
            BasicAuth::new("agent", "agent-password")
                .header_value()
                .as_str(),
        )
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"["charmers", "test-user"]"#)
        .create_async()
        .await;

    let client = HttpIdentityClient::new(&config(server.url())).unwrap();
    let groups = client.resolve_groups("bob").await.unwrap();

    assert_eq!(groups, ["charmers", "test-user"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_unknown_user() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/u/ghost/groups")
        .with_status(404)
        .create_async()
        .await;

    let client = HttpIdentityClient::new(&config(server.url())).unwrap();
    assert!(matches!(
        client.resolve_groups("ghost").await,
        Err(IdentityError::UnknownUser(user)) if user == "ghost"
    ));
}

#[tokio::test]
async fn test_server_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/v1/u/bob/groups")
        .with_status(503)
        .create_async()
        .await;

    let client = HttpIdentityClient::new(&config(server.url())).unwrap();
    assert!(matches!(
        client.resolve_groups("bob").await,
        Err(IdentityError::Status { status: 503, .. })
    ));
}
