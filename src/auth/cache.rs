use crate::auth::identity::{IdentityClient, IdentityError};
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// TTL cache in front of an [`IdentityClient`].
///
/// Only successful lookups are cached; concurrent lookups for the same user
/// share one request.
#[derive(Clone)]
pub struct GroupCache {
    client: Arc<dyn IdentityClient>,
    cache: Cache<String, Arc<Vec<String>>>,
}

impl GroupCache {
    pub fn new(client: Arc<dyn IdentityClient>, max_capacity: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self { client, cache }
    }

    pub async fn groups(&self, username: &str) -> Result<Arc<Vec<String>>, Arc<IdentityError>> {
        let client = Arc::clone(&self.client);
        let user = username.to_string();
        self.cache
            .try_get_with(username.to_string(), async move {
                client.resolve_groups(&user).await.map(Arc::new)
            })
            .await
    }

    pub async fn invalidate(&self, username: &str) {
        self.cache.invalidate(username).await;
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}
