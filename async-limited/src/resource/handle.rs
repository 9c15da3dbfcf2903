use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use log::warn;

use super::Lease;
use crate::pool::{PoolError, PoolInner};

/// A leased resource.
///
/// Exactly one of [`free`](Self::free), [`discard`](Self::discard) or a
/// failed [`regenerate`](Self::regenerate) ends the lease; afterwards every
/// operation fails with [`PoolError::AlreadyFreed`]. Dropping an open handle
/// frees it in the background.
pub struct Handle<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    id: usize,
    lease: Option<Lease<T>>,
    pool: Arc<PoolInner<T, E, S, K>>,
}

impl<T, E, S, K> Handle<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    pub(crate) fn new(pool: Arc<PoolInner<T, E, S, K>>, lease: Lease<T>) -> Self {
        Self {
            id: lease.id,
            lease: Some(lease),
            pool,
        }
    }

    /// The identifier of the current resource.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.lease.is_some()
    }

    /// Access the resource through the pool's getter.
    pub fn get(&self) -> Result<&K, PoolError<E>> {
        let lease = self.lease.as_ref().ok_or(PoolError::AlreadyFreed)?;
        Ok(self.pool.lifecycle().get(&lease.payload))
    }

    /// Return the resource to the idle pool after running `on_free`. If this
    /// future is dropped early the handle stays open.
    pub async fn free(&mut self) -> Result<(), PoolError<E>> {
        let lease = self.lease.as_mut().ok_or(PoolError::AlreadyFreed)?;
        let result = self.pool.lifecycle().free(&mut lease.payload, lease.id).await;
        if let Some(lease) = self.lease.take() {
            self.pool.restore(lease);
        }
        result.map_err(PoolError::Callback)
    }

    /// Destroy the resource instead of returning it. The leased slot is
    /// released before `on_free` runs, and an `on_free` error does not stop
    /// the destruction.
    pub async fn discard(&mut self) -> Result<(), PoolError<E>> {
        let lease = self.lease.take().ok_or(PoolError::AlreadyFreed)?;
        self.pool.begin_retire(lease.id);
        match self.pool.spawn_retire(lease, true).await {
            Ok(result) => result.map_err(PoolError::Callback),
            Err(_) => Err(PoolError::PoolClosed),
        }
    }

    /// Destroy the resource and replace it with a newly constructed one.
    /// The replacement is served ahead of every normal waiter.
    pub async fn regenerate(&mut self) -> Result<(), PoolError<E>> {
        let lease = self.lease.as_mut().ok_or(PoolError::AlreadyFreed)?;
        let freed = self.pool.lifecycle().free(&mut lease.payload, lease.id).await;
        let lease = self.lease.take().ok_or(PoolError::AlreadyFreed)?;
        let pool = self.pool.clone();
        let id = lease.id;

        if let Err(err) = freed {
            pool.begin_retire(id);
            if !matches!(pool.spawn_retire(lease, false).await, Ok(Ok(()))) {
                warn!("Error destroying resource {}", id);
            }
            return Err(PoolError::Callback(err));
        }

        let replacement = pool.begin_regenerate(id);
        if !matches!(pool.spawn_retire(lease, false).await, Ok(Ok(()))) {
            warn!("Error destroying regenerated resource {}", id);
        }

        let mut handle = replacement.await.unwrap_or(Err(PoolError::PoolClosed))?;
        let lease = handle.lease.take().ok_or(PoolError::AlreadyFreed)?;
        self.id = lease.id;
        self.lease.replace(lease);
        Ok(())
    }
}

impl<T, E, S, K> Debug for Handle<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: Debug + ?Sized + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Handle");
        dbg.field("id", &self.id);
        match self.get() {
            Ok(value) => dbg.field("value", &value),
            Err(_) => dbg.field("open", &false),
        };
        dbg.finish()
    }
}

impl<T, E, S, K> Drop for Handle<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            let pool = self.pool.clone();
            self.pool.spawn(async move {
                let id = lease.id;
                if pool.release(lease).await.is_err() {
                    warn!("Error freeing dropped resource {}", id);
                }
            });
        }
    }
}
