//! Redis backend for the response cache.

use crate::cache::{CacheBackendError, CacheStore};
use async_trait::async_trait;
use redis::AsyncCommands;

/// [`CacheStore`] over a Redis server.
///
/// Connections are multiplexed per operation; pooling and reconnection are
/// the client's concern. All errors are mapped into [`CacheBackendError`],
/// which the cache layer logs and degrades on.
#[derive(Debug, Clone)]
pub struct RedisStore {
    client: redis::Client,
}

impl RedisStore {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    /// Convenience constructor from a `redis://` URL.
    pub fn connect(url: &str) -> Result<Self, CacheBackendError> {
        let client = redis::Client::open(url).map_err(to_backend_error)?;
        Ok(Self { client })
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, CacheBackendError> {
        self.client.get_multiplexed_async_connection().await.map_err(to_backend_error)
    }
}

fn to_backend_error(err: redis::RedisError) -> CacheBackendError {
    CacheBackendError(err.to_string())
}

#[async_trait]
impl CacheStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key).await.map_err(to_backend_error)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> Result<(), CacheBackendError> {
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl_secs).await.map_err(to_backend_error)
    }

    async fn ttl(&self, key: &str) -> Result<Option<i64>, CacheBackendError> {
        let mut conn = self.connection().await?;
        let remaining: i64 = conn.ttl(key).await.map_err(to_backend_error)?;
        // Redis answers -2 for a missing key and -1 for a key without
        // expiry; every entry we write carries one.
        Ok((remaining >= 0).then_some(remaining))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheBackendError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(key).await.map_err(to_backend_error)
    }
}
