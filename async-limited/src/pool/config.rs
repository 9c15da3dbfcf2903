use std::future::Future;
use std::time::Duration;

use futures_core::future::BoxFuture;
use futures_lite::future::FutureExt;

use super::error::ConfigError;
use super::lifecycle::Lifecycle;
use super::pool::{Pool, PoolInner};
use crate::executor::{default_executor, Executor};

const DEFAULT_LIMIT: usize = 4;

fn identity<T>(res: &T) -> &T {
    res
}

/// Builder for a [`Pool`].
///
/// `T` is the pooled resource, `E` the error type shared by every callback,
/// `S` the pool-wide shared context handed to `create`, and `K` the view of
/// a resource returned by [`Handle::get`](crate::Handle::get).
pub struct PoolConfig<T, E, S = (), K: ?Sized = T> {
    acquire_timeout: Option<Duration>,
    construction_limit: Option<usize>,
    executor: Option<Box<dyn Executor>>,
    lifecycle: Lifecycle<T, E, S, K>,
    limit: usize,
    ttl: Option<Duration>,
}

impl<T, E> PoolConfig<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Create a pool without a shared context. `create` receives the
    /// identifier of the resource being built.
    pub fn new<C, F>(create: C) -> Self
    where
        C: Fn(usize) -> F + Send + Sync + 'static,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        PoolConfig::with_context(|| async { Ok(()) }, move |id, ()| create(id))
    }
}

impl<T, E, S> PoolConfig<T, E, S>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
{
    /// Create a pool with a shared context. `init` runs before the first
    /// resource is constructed, and again after every teardown of the
    /// context (see [`on_idle`](Self::on_idle)). `create` receives the
    /// resource identifier and a clone of the context.
    pub fn with_context<I, IF, C, F>(init: I, create: C) -> Self
    where
        I: Fn() -> IF + Send + Sync + 'static,
        IF: Future<Output = Result<S, E>> + Send + 'static,
        C: Fn(usize, S) -> F + Send + Sync + 'static,
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            acquire_timeout: None,
            construction_limit: None,
            executor: None,
            lifecycle: Lifecycle {
                create: Box::new(move |id, shared| create(id, shared).boxed()),
                destruct: None,
                getter: Box::new(identity),
                on_acquire: None,
                on_free: None,
                on_idle: None,
                on_init: Box::new(move || init().boxed()),
            },
            limit: DEFAULT_LIMIT,
            ttl: None,
        }
    }
}

impl<T, E, S, K> PoolConfig<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    /// The default timeout for [`Pool::acquire`].
    pub fn acquire_timeout(mut self, val: Duration) -> Self {
        if val.as_micros() > 0 {
            self.acquire_timeout.replace(val);
        } else {
            self.acquire_timeout.take();
        }
        self
    }

    /// The maximum number of resources under construction at once.
    pub fn construction_limit(mut self, val: usize) -> Self {
        self.construction_limit.replace(val);
        self
    }

    pub fn destruct<D, F>(mut self, destruct: D) -> Self
    where
        D: Fn(T, usize) -> F + Send + Sync + 'static,
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.lifecycle
            .destruct
            .replace(Box::new(move |res, id| destruct(res, id).boxed()));
        self
    }

    pub fn executor<X: Executor + 'static>(mut self, executor: X) -> Self {
        self.executor.replace(Box::new(executor));
        self
    }

    /// Map a resource to the value returned by
    /// [`Handle::get`](crate::Handle::get).
    pub fn getter<K2, G>(self, getter: G) -> PoolConfig<T, E, S, K2>
    where
        K2: ?Sized + 'static,
        G: Fn(&T) -> &K2 + Send + Sync + 'static,
    {
        PoolConfig {
            acquire_timeout: self.acquire_timeout,
            construction_limit: self.construction_limit,
            executor: self.executor,
            lifecycle: self.lifecycle.with_getter(Box::new(getter)),
            limit: self.limit,
            ttl: self.ttl,
        }
    }

    /// The maximum number of resources leased at once.
    pub fn limit(mut self, val: usize) -> Self {
        self.limit = val;
        self
    }

    /// Called after a resource is handed to a waiter and before its handle
    /// is returned. An error fails that acquire and returns the resource to
    /// the idle pool.
    pub fn on_acquire<A>(mut self, hook: A) -> Self
    where
        A: for<'a> Fn(&'a mut T, usize) -> BoxFuture<'a, Result<(), E>> + Send + Sync + 'static,
    {
        self.lifecycle.on_acquire.replace(Box::new(hook));
        self
    }

    /// Called when a handle gives up its resource, before it is returned to
    /// the idle pool or destroyed.
    pub fn on_free<A>(mut self, hook: A) -> Self
    where
        A: for<'a> Fn(&'a mut T, usize) -> BoxFuture<'a, Result<(), E>> + Send + Sync + 'static,
    {
        self.lifecycle.on_free.replace(Box::new(hook));
        self
    }

    /// Called with the shared context once the last live resource has been
    /// destroyed.
    pub fn on_idle<D, F>(mut self, idle: D) -> Self
    where
        D: Fn(S) -> F + Send + Sync + 'static,
        F: Future<Output = Result<(), E>> + Send + 'static,
    {
        self.lifecycle
            .on_idle
            .replace(Box::new(move |shared| idle(shared).boxed()));
        self
    }

    /// Destroy resources which stay idle for this long. A zero duration
    /// keeps idle resources until the pool is closed.
    pub fn ttl(mut self, val: Duration) -> Self {
        if val.as_micros() > 0 {
            self.ttl.replace(val);
        } else {
            self.ttl.take();
        }
        self
    }

    pub fn build(self) -> Result<Pool<T, E, S, K>, ConfigError> {
        if self.limit == 0 {
            return Err(ConfigError("limit must be greater than zero".to_owned()));
        }
        if self.construction_limit == Some(0) {
            return Err(ConfigError(
                "construction_limit must be greater than zero".to_owned(),
            ));
        }
        let executor = match self.executor {
            Some(executor) => executor,
            None => default_executor()?,
        };
        let inner = PoolInner::new(
            self.acquire_timeout,
            self.construction_limit.unwrap_or(usize::MAX),
            executor,
            self.lifecycle,
            self.limit,
            self.ttl,
        );
        Ok(Pool::new(inner))
    }
}
