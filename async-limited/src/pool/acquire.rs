use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_io::Timer;
use log::debug;

use super::error::PoolError;
use super::wait::Waiter;
use crate::resource::Handle;

/// The queue tier used for an acquisition.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Priority {
    #[default]
    Normal,
    /// Served before every normal waiter
    Elevated,
}

impl From<u8> for Priority {
    fn from(level: u8) -> Self {
        if level >= 1 {
            Self::Elevated
        } else {
            Self::Normal
        }
    }
}

/// Per-call options for [`Pool::acquire_with`](crate::Pool::acquire_with).
#[derive(Clone, Debug, Default)]
pub struct AcquireOptions {
    pub(crate) priority: Priority,
    pub(crate) timeout: Option<Duration>,
}

impl AcquireOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Stop waiting after this duration. A zero duration disables the
    /// pool's default timeout for this call.
    pub fn timeout(mut self, val: Duration) -> Self {
        self.timeout.replace(val);
        self
    }
}

type HandleResult<T, E, S, K> = Result<Handle<T, E, S, K>, PoolError<E>>;

/// A Future resolving to a [`Handle`] or a [`PoolError`].
///
/// The acquisition is registered with the pool as soon as the future is
/// created. Dropping it, or letting it time out, abandons the wait but not
/// the acquisition: the resource is freed once it has been handed over.
/// Polling again after completion returns [`PoolError::PoolClosed`].
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct Acquire<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    receive: Option<Waiter<HandleResult<T, E, S, K>>>,
    timer: Option<Timer>,
}

impl<T, E, S, K> Acquire<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    pub(crate) fn new(receive: Waiter<HandleResult<T, E, S, K>>, timeout: Option<Duration>) -> Self {
        Self {
            receive: Some(receive),
            timer: timeout
                .filter(|dur| dur.as_micros() > 0)
                .map(Timer::after),
        }
    }
}

impl<T, E, S, K> Future for Acquire<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    type Output = HandleResult<T, E, S, K>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let receive = match self.receive.as_mut() {
            Some(receive) => receive,
            None => {
                // future already completed
                return Poll::Ready(Err(PoolError::PoolClosed));
            }
        };

        if let Poll::Ready(result) = Pin::new(receive).poll(cx) {
            self.receive.take();
            self.timer.take();
            // the pipeline only disappears without replying if its executor is gone
            return Poll::Ready(result.unwrap_or(Err(PoolError::PoolClosed)));
        }

        if let Some(timer) = self.timer.as_mut() {
            if Pin::new(timer).poll(cx).is_ready() {
                debug!("acquire timed out");
                self.receive.take();
                self.timer.take();
                return Poll::Ready(Err(PoolError::Timeout));
            }
        }

        Poll::Pending
    }
}

impl<T, E, S, K> Debug for Acquire<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquire")
            .field("complete", &self.receive.is_none())
            .field("timeout", &self.timer.is_some())
            .finish()
    }
}
