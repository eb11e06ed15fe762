use std::time::Duration;

use async_trait::async_trait;
use moka::sync::Cache;
use redis::aio::ConnectionManager;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::CacheSettings;
use crate::metrics::track_cache_operation;
use crate::models::QuestionType;

const KEY_PREFIX: &str = "feedback:";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("cache value is not valid text: {0}")]
    Serialization(String),
}

/// Memoized feedback text. Callers treat any error as a miss.
#[async_trait]
pub trait FeedbackCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;
}

/// Stable key for `(question, type, normalized answer, learner)`. Contains no
/// salt, so it survives process restarts.
pub fn cache_key(
    question_id: i64,
    question_type: QuestionType,
    normalized_answer: &str,
    user_id: Option<&str>,
) -> String {
    // JSON array encoding keeps component boundaries unambiguous
    let material = serde_json::json!([
        question_id,
        question_type.as_str(),
        normalized_answer,
        user_id
    ])
    .to_string();
    let digest = Sha256::digest(material.as_bytes());
    format!("{}{}", KEY_PREFIX, hex::encode(digest))
}

pub struct InMemoryFeedbackCache {
    entries: Cache<String, String>,
}

impl InMemoryFeedbackCache {
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.capacity, settings.ttl())
    }
}

impl Default for InMemoryFeedbackCache {
    fn default() -> Self {
        Self::from_settings(&CacheSettings::default())
    }
}

#[async_trait]
impl FeedbackCache for InMemoryFeedbackCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.get(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct RedisFeedbackCache {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisFeedbackCache {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    pub async fn connect(settings: &CacheSettings, uri: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(uri)?;

        tracing::info!("Attempting to connect to Redis feedback cache...");
        let redis = tokio::time::timeout(
            Duration::from_secs(10),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 10s"))??;
        tracing::info!("Redis feedback cache connected");

        Ok(Self::new(redis, settings.ttl_seconds))
    }
}

#[async_trait]
impl FeedbackCache for RedisFeedbackCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.clone();
        let raw: Option<Vec<u8>> = track_cache_operation(
            "get",
            redis::cmd("GET").arg(key).query_async(&mut conn),
        )
        .await?;

        raw.map(|bytes| {
            String::from_utf8(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut conn = self.redis.clone();
        track_cache_operation(
            "set",
            redis::cmd("SETEX")
                .arg(key)
                .arg(self.ttl_seconds)
                .arg(value)
                .query_async::<()>(&mut conn),
        )
        .await?;
        Ok(())
    }
}
