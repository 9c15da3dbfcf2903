use std::convert::Infallible;
use std::future::Future;

use crate::pool::{ConfigError, Pool, PoolConfig, PoolError};

/// Runs futures with a bound on how many execute at once.
#[derive(Clone, Debug)]
pub struct Limited {
    pool: Pool<(), Infallible>,
}

/// Create a [`Limited`] runner which allows `limit` concurrent tasks.
pub fn limited(limit: usize) -> Result<Limited, ConfigError> {
    let pool = PoolConfig::<(), Infallible>::new(|_id| async { Ok(()) }).limit(limit).build()?;
    Ok(Limited { pool })
}

impl Limited {
    /// Wait for a free slot, then run the future produced by `f`. The slot is
    /// released when the future completes, or in the background if it panics
    /// or is dropped.
    pub async fn run<F, Fut, R>(&self, f: F) -> Result<R, PoolError<Infallible>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let mut slot = self.pool.acquire().await?;
        let result = f().await;
        slot.free().await?;
        Ok(result)
    }

    /// The number of tasks waiting for a slot.
    pub fn queue_depth(&self) -> usize {
        self.pool.queue_depth()
    }

    pub async fn close(&self) {
        self.pool.close().await
    }
}
