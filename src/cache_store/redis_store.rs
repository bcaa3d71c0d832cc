use async_trait::async_trait;
use fieldx::fxstruct;
use redis::aio::ConnectionManager;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;
use tracing::instrument;

use super::decode_book;
use super::encode_book;
use crate::error::CacheError;
use crate::traits::CacheStore;
use crate::types::Book;

/// Cache store backed by a Redis server. Entries are plain `SET key payload EX ttl` strings.
#[fxstruct(sync, no_new)]
pub struct RedisCacheStore {
    #[fieldx(get(clone))]
    url: String,

    #[fieldx(get(clone))]
    connection: ConnectionManager,
}

impl RedisCacheStore {
    pub fn url_for(host: &str, port: u16) -> String {
        format!("redis://{host}:{port}/")
    }

    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let connection = ConnectionManager::new(client).await?;
        debug!(url, "connected to redis");
        Ok(Self {
            url: url.to_string(),
            connection,
        })
    }

    pub async fn connect_to(host: &str, port: u16) -> Result<Self, CacheError> {
        Self::connect(&Self::url_for(host, port)).await
    }
}

impl Debug for RedisCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCacheStore").field("url", &self.url).finish()
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    #[instrument(level = "trace", skip(self, book))]
    async fn put(&self, key: &str, book: &Book, ttl: Duration) -> Result<(), CacheError> {
        let payload = encode_book(book)?;
        let mut conn = self.connection();
        redis::cmd("SET")
            .arg(key)
            .arg(payload)
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Book>, CacheError> {
        let mut conn = self.connection();
        let payload: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        payload.as_deref().map(decode_book).transpose()
    }

    #[instrument(level = "trace", skip(self))]
    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.connection();
        let removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut conn).await?;
        Ok(removed > 0)
    }
}
