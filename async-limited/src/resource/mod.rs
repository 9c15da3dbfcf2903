use std::fmt::{self, Debug, Formatter};

use crate::pool::wait::{waiter_pair, WaitResponder, Waiter};
use crate::pool::PoolError;

mod handle;
pub use handle::Handle;

enum Payload<T, E> {
    Pending(Waiter<Result<T, E>>),
    Ready(T),
}

/// Dropping the timer cancels the scheduled eviction.
pub(crate) struct EvictionTimer {
    serial: u64,
    _cancel: WaitResponder<()>,
}

impl EvictionTimer {
    pub fn new(serial: u64, cancel: WaitResponder<()>) -> Self {
        Self {
            serial,
            _cancel: cancel,
        }
    }
}

/// A resource owned by the pool, either idle or still under construction.
pub(crate) struct Resource<T, E> {
    id: usize,
    payload: Payload<T, E>,
    eviction: Option<EvictionTimer>,
}

impl<T, E> Resource<T, E> {
    /// Create a record whose payload is delivered later through the returned
    /// construction signal.
    pub fn constructing(id: usize) -> (Self, WaitResponder<Result<T, E>>) {
        let (signal, waiter) = waiter_pair();
        let res = Self {
            id,
            payload: Payload::Pending(waiter),
            eviction: None,
        };
        (res, signal)
    }

    pub fn ready(lease: Lease<T>) -> Self {
        Self {
            id: lease.id,
            payload: Payload::Ready(lease.payload),
            eviction: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.payload, Payload::Ready(_))
    }

    /// Complete construction of a record which is still idle.
    pub fn fulfill(&mut self, payload: T) {
        self.payload = Payload::Ready(payload);
    }

    pub fn arm(&mut self, timer: EvictionTimer) {
        self.eviction.replace(timer);
    }

    pub fn cancel_eviction(&mut self) {
        self.eviction.take();
    }

    pub fn is_armed(&self) -> bool {
        self.eviction.is_some()
    }

    pub fn eviction_serial(&self) -> Option<u64> {
        self.eviction.as_ref().map(|timer| timer.serial)
    }

    /// Wait for construction to complete and take the payload.
    pub async fn resolve(self) -> Result<Lease<T>, PoolError<E>> {
        let id = self.id;
        let payload = match self.payload {
            Payload::Ready(payload) => payload,
            Payload::Pending(waiter) => match waiter.await {
                Ok(Ok(payload)) => payload,
                Ok(Err(err)) => return Err(PoolError::Callback(err)),
                Err(_) => return Err(PoolError::PoolClosed),
            },
        };
        Ok(Lease { id, payload })
    }
}

impl<T, E> Debug for Resource<T, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("id", &self.id)
            .field("ready", &self.is_ready())
            .field("eviction", &self.eviction_serial())
            .finish()
    }
}

/// A constructed resource on loan to a handle.
pub(crate) struct Lease<T> {
    pub id: usize,
    pub payload: T,
}
