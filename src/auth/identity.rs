use crate::config::IdentityConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use thiserror::Error;
use tracing::debug;

/// Failure to look up a user's groups
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("invalid identity API URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("user {0:?} not found")]
    UnknownUser(String),

    #[error("identity service returned status {status} for user {user:?}")]
    Status { status: u16, user: String },
}

/// External identity manager answering group-membership questions
#[async_trait]
pub trait IdentityClient: Send + Sync + 'static {
    async fn resolve_groups(&self, username: &str) -> Result<Vec<String>, IdentityError>;
}

/// Identity manager client: `GET <api_url>/v1/u/<user>/groups`
#[derive(Clone)]
pub struct HttpIdentityClient {
    client: Client,
    base_url: Url,
    username: String,
    password: String,
}

impl HttpIdentityClient {
    pub fn new(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let base_url = Url::parse(&config.api_url).map_err(|e| IdentityError::InvalidUrl {
            url: config.api_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(IdentityError::InvalidUrl {
                url: config.api_url.clone(),
                reason: "not a base URL".to_string(),
            });
        }

        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    fn groups_url(&self, username: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v1", "u", username, "groups"]);
        }
        url
    }
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn resolve_groups(&self, username: &str) -> Result<Vec<String>, IdentityError> {
        let url = self.groups_url(username);
        debug!(%url, "fetching user groups");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(IdentityError::UnknownUser(username.to_string())),
            status if !status.is_success() => Err(IdentityError::Status {
                status: status.as_u16(),
                user: username.to_string(),
            }),
            _ => Ok(response.json::<Vec<String>>().await?),
        }
    }
}
