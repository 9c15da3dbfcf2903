use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_io::Timer;
use futures_lite::future::{self, FutureExt};
use log::{debug, info, trace, warn};

use super::acquire::{Acquire, AcquireOptions, Priority};
use super::context::{ContextStep, SharedContext};
use super::error::PoolError;
use super::lifecycle::Lifecycle;
use super::queue::WaitQueue;
use super::wait::{waiter_pair, WaitResponder, Waiter};
use crate::executor::Executor;
use crate::resource::{EvictionTimer, Handle, Lease, Resource};

type HandleResult<T, E, S, K> = Result<Handle<T, E, S, K>, PoolError<E>>;

type Handoff<T, E> = WaitResponder<Result<Resource<T, E>, PoolError<E>>>;

/// A resource paired with a waiter, from the handoff until it is returned
/// to the idle pool or destroyed.
#[derive(Default)]
struct PendingLease {
    watchers: Vec<WaitResponder<()>>,
}

impl PendingLease {
    /// Resolves once this lease is removed from the pool state.
    fn watch(&mut self) -> Waiter<()> {
        let (responder, waiter) = waiter_pair();
        self.watchers.push(responder);
        waiter
    }
}

struct PoolState<T, E, S> {
    closing: bool,
    constructing: usize,
    context: SharedContext<S>,
    idle: Vec<Resource<T, E>>,
    leases: HashMap<usize, PendingLease>,
    live: usize,
    next_id: usize,
    next_timer: u64,
    retiring: HashMap<usize, PendingLease>,
    waiters: WaitQueue<Handoff<T, E>>,
}

impl<T, E, S: Clone> PoolState<T, E, S> {
    fn new() -> Self {
        Self {
            closing: false,
            constructing: 0,
            context: SharedContext::new(),
            idle: Vec::new(),
            leases: HashMap::new(),
            live: 0,
            next_id: 1,
            next_timer: 0,
            retiring: HashMap::new(),
            waiters: WaitQueue::new(),
        }
    }
}

pub(crate) struct PoolInner<T, E, S, K: ?Sized> {
    acquire_timeout: Option<Duration>,
    construction_limit: usize,
    executor: Box<dyn Executor>,
    lifecycle: Lifecycle<T, E, S, K>,
    limit: usize,
    state: Mutex<PoolState<T, E, S>>,
    ttl: Option<Duration>,
}

impl<T, E, S, K> PoolInner<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    pub fn new(
        acquire_timeout: Option<Duration>,
        construction_limit: usize,
        executor: Box<dyn Executor>,
        lifecycle: Lifecycle<T, E, S, K>,
        limit: usize,
        ttl: Option<Duration>,
    ) -> Self {
        Self {
            acquire_timeout,
            construction_limit,
            executor,
            lifecycle,
            limit,
            state: Mutex::new(PoolState::new()),
            ttl,
        }
    }

    fn state(&self) -> MutexGuard<'_, PoolState<T, E, S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lifecycle(&self) -> &Lifecycle<T, E, S, K> {
        &self.lifecycle
    }

    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.executor.spawn_ok(task.boxed())
    }

    /// Register a waiter and start the pipeline which turns its handoff into
    /// a `Handle`.
    pub fn enqueue(self: &Arc<Self>, priority: Priority) -> Waiter<HandleResult<T, E, S, K>> {
        let mut state = self.state();
        self.register(&mut state, priority)
    }

    fn register(
        self: &Arc<Self>,
        state: &mut PoolState<T, E, S>,
        priority: Priority,
    ) -> Waiter<HandleResult<T, E, S, K>> {
        let (reply, receive) = waiter_pair();
        if state.closing {
            reply.send(Err(PoolError::PoolClosed)).unwrap_or(());
            return receive;
        }
        let (handoff, incoming) = waiter_pair();
        state.waiters.push(priority, handoff);
        self.spawn(self.clone().lease(incoming, reply));
        self.service(state);
        receive
    }

    /// Pair waiters with idle resources, constructing new ones while the
    /// limits allow, then arm eviction timers on whatever remains idle.
    fn service(self: &Arc<Self>, state: &mut PoolState<T, E, S>) {
        if state.closing {
            return;
        }
        loop {
            while !state.waiters.is_empty() {
                let mut resource = match state.idle.pop() {
                    Some(resource) => resource,
                    None => break,
                };
                let waiter = match state.waiters.pop() {
                    Some(waiter) => waiter,
                    None => {
                        state.idle.push(resource);
                        break;
                    }
                };
                resource.cancel_eviction();
                let id = resource.id();
                state.leases.insert(id, PendingLease::default());
                trace!("Handing off resource {}", id);
                if let Err(Ok(resource)) = waiter.send(Ok(resource)) {
                    // the acquisition pipeline is gone
                    state.leases.remove(&id);
                    state.idle.push(resource);
                }
            }
            if !self.allocate(state) {
                break;
            }
        }
        self.arm_idle(state);
    }

    fn allocate(self: &Arc<Self>, state: &mut PoolState<T, E, S>) -> bool {
        if state.waiters.is_empty()
            || !state.idle.is_empty()
            || state.leases.len() >= self.limit
            || state.constructing >= self.construction_limit
        {
            return false;
        }
        let id = state.next_id;
        state.next_id += 1;
        state.constructing += 1;
        state.live += 1;
        let (resource, signal) = Resource::constructing(id);
        state.idle.push(resource);
        debug!("Constructing resource {}", id);
        self.spawn(self.clone().construct(id, signal));
        true
    }

    fn arm_idle(self: &Arc<Self>, state: &mut PoolState<T, E, S>) {
        let ttl = match self.ttl {
            Some(ttl) if !state.closing => ttl,
            _ => return,
        };
        for resource in state
            .idle
            .iter_mut()
            .filter(|res| res.is_ready() && !res.is_armed())
        {
            state.next_timer += 1;
            let serial = state.next_timer;
            let id = resource.id();
            let (cancel, canceled) = waiter_pair();
            let pool = self.clone();
            self.spawn(async move {
                let expired = future::or(
                    async move {
                        Timer::after(ttl).await;
                        true
                    },
                    async move {
                        canceled.await.unwrap_or(());
                        false
                    },
                )
                .await;
                if expired {
                    pool.evict(id, serial).await;
                }
            });
            resource.arm(EvictionTimer::new(serial, cancel));
        }
    }

    async fn construct(self: Arc<Self>, id: usize, signal: WaitResponder<Result<T, E>>) {
        let result = match self.enter_context().await {
            Ok(shared) => self.lifecycle.create(id, shared).await,
            Err(err) => Err(err),
        };

        let orphan = {
            let mut guard = self.state();
            let state = &mut *guard;
            state.constructing -= 1;
            let pos = state.idle.iter().position(|res| res.id() == id);
            let orphan = match result {
                Ok(payload) => {
                    debug!("Constructed resource {}", id);
                    match pos {
                        Some(pos) => {
                            state.idle[pos].fulfill(payload);
                            None
                        }
                        None => match signal.send(Ok(payload)) {
                            Err(Ok(payload)) => Some(Some(payload)),
                            _ => None,
                        },
                    }
                }
                Err(err) => {
                    warn!("Error constructing resource {}", id);
                    match pos {
                        Some(pos) => {
                            state.idle.remove(pos);
                            Some(None)
                        }
                        None => signal.send(Err(err)).err().map(|_| None),
                    }
                }
            };
            if orphan.is_some() {
                state.retiring.insert(id, PendingLease::default());
            }
            self.service(state);
            orphan
        };

        if let Some(payload) = orphan {
            if self.finish_retire(id, payload).await.is_err() {
                warn!("Error destroying resource {}", id);
            }
        }
    }

    async fn enter_context(&self) -> Result<S, E> {
        loop {
            let step = self.state().context.enter();
            match step {
                ContextStep::Ready(shared) => return Ok(shared),
                ContextStep::Wait(waiter) => waiter.await.unwrap_or(()),
                ContextStep::Init => {
                    info!("Initializing shared context");
                    let result = self.lifecycle.init().await;
                    let mut state = self.state();
                    return match result {
                        Ok(shared) => {
                            state.context.ready(shared.clone());
                            Ok(shared)
                        }
                        Err(err) => {
                            warn!("Error initializing shared context");
                            state.context.failed();
                            Err(err)
                        }
                    };
                }
            }
        }
    }

    async fn lease(
        self: Arc<Self>,
        incoming: Waiter<Result<Resource<T, E>, PoolError<E>>>,
        reply: WaitResponder<HandleResult<T, E, S, K>>,
    ) {
        let result = self
            .checkout(incoming)
            .await
            .map(|lease| Handle::new(self.clone(), lease));
        if let Err(Ok(mut handle)) = reply.send(result) {
            debug!("Acquire abandoned, releasing resource {}", handle.id());
            if handle.free().await.is_err() {
                warn!("Error releasing abandoned resource {}", handle.id());
            }
        }
    }

    async fn checkout(
        self: &Arc<Self>,
        incoming: Waiter<Result<Resource<T, E>, PoolError<E>>>,
    ) -> Result<Lease<T>, PoolError<E>> {
        let resource = match incoming.await {
            Ok(Ok(resource)) => resource,
            Ok(Err(err)) => return Err(err),
            Err(_) => return Err(PoolError::PoolClosed),
        };
        let id = resource.id();
        let mut lease = match resource.resolve().await {
            Ok(lease) => lease,
            Err(err) => {
                self.begin_retire(id);
                self.finish_retire(id, None).await.unwrap_or(());
                return Err(err);
            }
        };
        if let Err(err) = self.lifecycle.acquire(&mut lease.payload, id).await {
            warn!("Error preparing resource {} for use", id);
            self.restore(lease);
            return Err(PoolError::Callback(err));
        }
        Ok(lease)
    }

    /// Return a leased resource to the idle pool.
    pub fn restore(self: &Arc<Self>, lease: Lease<T>) {
        let mut guard = self.state();
        let state = &mut *guard;
        trace!("Returning resource {}", lease.id);
        state.leases.remove(&lease.id);
        state.idle.push(Resource::ready(lease));
        self.service(state);
    }

    /// Run `on_free` and return the resource to the idle pool. The resource
    /// is returned even when the hook fails.
    pub async fn release(self: &Arc<Self>, mut lease: Lease<T>) -> Result<(), PoolError<E>> {
        let result = self.lifecycle.free(&mut lease.payload, lease.id).await;
        self.restore(lease);
        result.map_err(PoolError::Callback)
    }

    /// Give up the leased slot of a resource which is about to be destroyed.
    pub fn begin_retire(self: &Arc<Self>, id: usize) {
        let mut guard = self.state();
        let state = &mut *guard;
        if let Some(pending) = state.leases.remove(&id) {
            state.retiring.insert(id, pending);
        }
        self.service(state);
    }

    /// Give up the leased slot of a resource and queue an elevated waiter for
    /// its replacement.
    pub fn begin_regenerate(self: &Arc<Self>, id: usize) -> Waiter<HandleResult<T, E, S, K>> {
        let mut guard = self.state();
        let state = &mut *guard;
        if let Some(pending) = state.leases.remove(&id) {
            state.retiring.insert(id, pending);
        }
        self.register(state, Priority::Elevated)
    }

    /// Destroy a retiring resource on the pool executor, optionally running
    /// `on_free` first. The task completes even if the returned waiter is
    /// dropped.
    pub fn spawn_retire(
        self: &Arc<Self>,
        mut lease: Lease<T>,
        free_first: bool,
    ) -> Waiter<Result<(), E>> {
        let (done, complete) = waiter_pair();
        let pool = self.clone();
        self.spawn(async move {
            let id = lease.id;
            if free_first && pool.lifecycle.free(&mut lease.payload, id).await.is_err() {
                warn!("Error freeing discarded resource {}", id);
            }
            done.send(pool.finish_retire(id, Some(lease.payload)).await)
                .unwrap_or(());
        });
        complete
    }

    /// Destroy a retiring resource and settle its lease.
    pub async fn finish_retire(&self, id: usize, payload: Option<T>) -> Result<(), E> {
        let result = self.dispose_payload(id, payload).await;
        self.state().retiring.remove(&id);
        result
    }

    async fn dispose(&self, resource: Resource<T, E>) -> Result<(), E> {
        let id = resource.id();
        let payload = resource.resolve().await.ok().map(|lease| lease.payload);
        self.dispose_payload(id, payload).await
    }

    async fn dispose_payload(&self, id: usize, payload: Option<T>) -> Result<(), E> {
        let result = match payload {
            Some(payload) => {
                debug!("Destroying resource {}", id);
                self.lifecycle.destruct(payload, id).await
            }
            None => Ok(()),
        };
        self.retire_worker().await;
        result
    }

    async fn retire_worker(&self) {
        let shared = {
            let mut state = self.state();
            state.live = state.live.saturating_sub(1);
            if state.live == 0 {
                state.context.release()
            } else {
                None
            }
        };
        if let Some(shared) = shared {
            info!("Releasing shared context");
            if self.lifecycle.idle(shared).await.is_err() {
                warn!("Error releasing shared context");
            }
            self.state().context.released();
        }
    }

    async fn evict(&self, id: usize, serial: u64) {
        let resource = {
            let mut state = self.state();
            let pos = state
                .idle
                .iter()
                .position(|res| res.id() == id && res.eviction_serial() == Some(serial));
            match pos {
                Some(pos) => {
                    state.retiring.insert(id, PendingLease::default());
                    Some(state.idle.remove(pos))
                }
                None => None,
            }
        };
        if let Some(resource) = resource {
            debug!("Evicting idle resource {}", id);
            if self.dispose(resource).await.is_err() {
                warn!("Error destroying resource {}", id);
            }
            self.state().retiring.remove(&id);
        }
    }

    pub async fn close(&self) {
        let (waiters, watches) = {
            let mut guard = self.state();
            let state = &mut *guard;
            if !state.closing {
                info!("Closing resource pool");
                state.closing = true;
            }
            let waiters = state.waiters.drain().collect::<Vec<_>>();
            let watches = state
                .leases
                .values_mut()
                .chain(state.retiring.values_mut())
                .map(PendingLease::watch)
                .collect::<Vec<_>>();
            (waiters, watches)
        };

        for waiter in waiters {
            waiter.send(Err(PoolError::PoolClosed)).unwrap_or(());
        }
        for watch in watches {
            watch.await.unwrap_or(());
        }

        let idle = mem::take(&mut self.state().idle);
        for mut resource in idle {
            resource.cancel_eviction();
            let id = resource.id();
            if self.dispose(resource).await.is_err() {
                warn!("Error destroying resource {}", id);
            }
        }
    }
}

/// An async resource pool.
///
/// Cloning a `Pool` produces another reference to the same pool.
pub struct Pool<T, E, S = (), K: ?Sized = T> {
    inner: Arc<PoolInner<T, E, S, K>>,
}

impl<T, E, S, K> Pool<T, E, S, K>
where
    T: Send + 'static,
    E: Send + 'static,
    S: Clone + Send + Sync + 'static,
    K: ?Sized + 'static,
{
    pub(crate) fn new(inner: PoolInner<T, E, S, K>) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Request a resource from the pool. The request is queued immediately,
    /// before the returned future is first polled.
    pub fn acquire(&self) -> Acquire<T, E, S, K> {
        self.acquire_with(AcquireOptions::default())
    }

    pub fn acquire_with(&self, options: AcquireOptions) -> Acquire<T, E, S, K> {
        let timeout = options.timeout.or(self.inner.acquire_timeout);
        Acquire::new(self.inner.enqueue(options.priority), timeout)
    }

    /// Reject all queued waiters, wait for every leased resource to be
    /// returned, then destroy the idle resources.
    pub async fn close(&self) {
        self.inner.close().await
    }

    /// The number of live resources, whether idle, leased or under
    /// construction.
    pub fn count(&self) -> usize {
        self.inner.state().live
    }

    /// The number of resources currently leased.
    pub fn pending_count(&self) -> usize {
        self.inner.state().leases.len()
    }

    /// The number of acquisitions waiting for a resource.
    pub fn queue_depth(&self) -> usize {
        self.inner.state().waiters.len()
    }
}

impl<T, E, S, K: ?Sized> Clone for Pool<T, E, S, K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T, E, S, K: ?Sized> Debug for Pool<T, E, S, K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Pool")
            .field("closing", &state.closing)
            .field("context", &state.context.is_active())
            .field("count", &state.live)
            .field("idle", &state.idle.len())
            .field("pending", &state.leases.len())
            .field("waiters", &state.waiters.len())
            .finish()
    }
}
