//! Concurrency limit for queries.
//!
//! HTTP keep-alive is reqwest's job; the pool only bounds how many queries
//! are in flight. A permit is held for the life of a [`PooledConnection`],
//! including streams that are dropped before they finish.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use super::connection::ChConnection;
use crate::config::ChConfig;
use crate::error::{ChError, ChResult};

/// # Example
/// ```ignore
/// let pool = ChPool::new(ChConfig::default().max_connections(4))?;
/// let conn = pool.get().await?;
/// conn.ping().await?;
/// ```
#[derive(Debug, Clone)]
pub struct ChPool {
    config: Arc<ChConfig>,
    connection: ChConnection,
    semaphore: Arc<Semaphore>,
}

impl ChPool {
    pub fn new(config: ChConfig) -> ChResult<Self> {
        if config.max_connections == 0 {
            return Err(ChError::Config("max_connections must be at least 1".to_string()));
        }
        Ok(Self {
            connection: ChConnection::new(&config)?,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
        })
    }

    /// Wait for a free slot, up to the configured acquire timeout.
    pub async fn get(&self) -> ChResult<PooledConnection> {
        let acquire_timeout = self.config.acquire_timeout;
        let permit = tokio::time::timeout(acquire_timeout, self.semaphore.clone().acquire_owned())
            .await
            .map_err(|_| {
                ChError::Pool(format!(
                    "Timed out waiting for connection ({}s)",
                    acquire_timeout.as_secs()
                ))
            })?
            .map_err(|_| ChError::Pool("Pool closed".to_string()))?;

        Ok(PooledConnection {
            conn: self.connection.clone(),
            _permit: permit,
        })
    }

    pub fn config(&self) -> &ChConfig {
        &self.config
    }

    /// Slots not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.config.max_connections
    }
}

/// A connection that frees its pool slot on drop.
#[derive(Debug)]
pub struct PooledConnection {
    conn: ChConnection,
    _permit: OwnedSemaphorePermit,
}

impl std::ops::Deref for PooledConnection {
    type Target = ChConnection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_permits_released_on_drop() {
        let pool = ChPool::new(ChConfig::default().max_connections(2)).unwrap();
        assert_eq!(pool.available(), 2);

        let a = pool.get().await.unwrap();
        let b = pool.get().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(a);
        assert_eq!(pool.available(), 1);
        drop(b);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn test_acquire_timeout() {
        let pool = ChPool::new(
            ChConfig::default()
                .max_connections(1)
                .acquire_timeout(Duration::from_millis(20)),
        )
        .unwrap();
        let _held = pool.get().await.unwrap();
        assert!(matches!(pool.get().await, Err(ChError::Pool(_))));
    }

    #[test]
    fn test_zero_connections_rejected() {
        assert!(matches!(
            ChPool::new(ChConfig::default().max_connections(0)),
            Err(ChError::Config(_))
        ));
    }
}
