use std::fmt::Display;

use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::AppResult;
use crate::models::CourseId;

/// Keys for cached ranked course-id lists
///
/// Keys embed the model generation so a new generation never serves lists ranked
/// by the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    SimilarCourses {
        generation: String,
        course_id: CourseId,
        n: usize,
        exclude_query_course: bool,
    },
    UserRecommendations {
        generation: String,
        user_id: String,
        n: usize,
    },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::SimilarCourses {
                generation,
                course_id,
                n,
                exclude_query_course,
            } => {
                let policy = if *exclude_query_course { "noself" } else { "self" };
                write!(f, "similar:{}:{}:{}:{}", generation, course_id, n, policy)
            }
            CacheKey::UserRecommendations {
                generation,
                user_id,
                n,
            } => write!(f, "user:{}:{}:{}", generation, user_id, n),
        }
    }
}

/// Creates a Redis client for the recommendation cache
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// A pending write for the background writer
struct CacheWrite {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed cache of serialized values
///
/// Reads go straight to Redis. Writes are queued and applied by a background task
/// so a request never waits on a cache write.
#[derive(Clone)]
pub struct Cache {
    conn: ConnectionManager,
    write_tx: mpsc::UnboundedSender<CacheWrite>,
}

/// Stops the background writer once the server is done with the cache
pub struct CacheWriterHandle {
    shutdown_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the writer, then waits until it has applied every queued write
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Connects to Redis and starts the background writer
    pub async fn new(client: Client) -> AppResult<(Self, CacheWriterHandle)> {
        let conn = ConnectionManager::new(client).await?;
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(writer_task(conn.clone(), write_rx, shutdown_rx));

        Ok((Self { conn, write_tx }, CacheWriterHandle { shutdown_tx, task }))
    }

    /// Reads and decodes the value stored under `key`
    ///
    /// A value that no longer decodes as `T` is treated as a miss so it gets
    /// recomputed and overwritten.
    pub async fn get_from_cache<T: DeserializeOwned>(&self, key: &CacheKey) -> AppResult<Option<T>> {
        let mut conn = self.conn.clone();
        let key = key.to_string();
        let cached: Option<String> = conn.get(&key).await?;

        let Some(json) = cached else {
            tracing::debug!(key = %key, "Cache miss");
            return Ok(None);
        };

        match serde_json::from_str(&json) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Ok(Some(value))
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
                Ok(None)
            }
        }
    }

    /// Queues `value` to be stored under `key` for `ttl` seconds
    pub fn set_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let value = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization error");
                return;
            }
        };

        let write = CacheWrite {
            key: key.to_string(),
            value,
            ttl,
        };
        if self.write_tx.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped, dropping write");
        }
    }
}

async fn writer_task(
    mut conn: ConnectionManager,
    mut write_rx: mpsc::UnboundedReceiver<CacheWrite>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    tracing::info!("Cache writer started");

    loop {
        tokio::select! {
            Some(write) = write_rx.recv() => apply(&mut conn, write).await,
            _ = &mut shutdown_rx => break,
            else => break,
        }
    }

    let mut flushed = 0usize;
    while let Ok(write) = write_rx.try_recv() {
        apply(&mut conn, write).await;
        flushed += 1;
    }
    tracing::info!(flushed = flushed, "Cache writer stopped");
}

async fn apply(conn: &mut ConnectionManager, write: CacheWrite) {
    let result: redis::RedisResult<()> = conn.set_ex(&write.key, write.value, write.ttl).await;
    if let Err(e) = result {
        tracing::error!(key = %write.key, error = %e, "Failed to write to Redis cache");
    }
}
