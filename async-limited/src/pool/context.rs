use std::mem;

use super::wait::{waiter_pair, WaitResponder, Waiter};

/// The next step for a construction that needs the shared context.
pub(crate) enum ContextStep<S> {
    /// The context is available
    Ready(S),
    /// The caller must run `on_init` and report back with `ready` or `failed`
    Init,
    /// Another task is initializing or releasing the context, retry after
    /// the waiter resolves
    Wait(Waiter<()>),
}

enum ContextState<S> {
    Vacant,
    Initializing(Vec<WaitResponder<()>>),
    Ready(S),
    Releasing(Vec<WaitResponder<()>>),
}

/// Tracks the pool-wide context value shared by every constructed resource.
///
/// Initialization is single-flight and teardown always completes before the
/// next initialization begins, so `on_init` and `on_idle` strictly alternate.
pub(crate) struct SharedContext<S> {
    state: ContextState<S>,
}

impl<S> SharedContext<S> {
    pub fn is_active(&self) -> bool {
        !matches!(self.state, ContextState::Vacant)
    }
}

impl<S: Clone> SharedContext<S> {
    pub fn new() -> Self {
        Self {
            state: ContextState::Vacant,
        }
    }

    pub fn enter(&mut self) -> ContextStep<S> {
        match &mut self.state {
            ContextState::Ready(shared) => ContextStep::Ready(shared.clone()),
            ContextState::Initializing(waiters) | ContextState::Releasing(waiters) => {
                let (responder, waiter) = waiter_pair();
                waiters.push(responder);
                ContextStep::Wait(waiter)
            }
            ContextState::Vacant => {
                self.state = ContextState::Initializing(Vec::new());
                ContextStep::Init
            }
        }
    }

    pub fn ready(&mut self, shared: S) {
        let prev = mem::replace(&mut self.state, ContextState::Ready(shared));
        if let ContextState::Initializing(waiters) = prev {
            wake(waiters);
        }
    }

    pub fn failed(&mut self) {
        if let ContextState::Initializing(waiters) =
            mem::replace(&mut self.state, ContextState::Vacant)
        {
            wake(waiters);
        }
    }

    /// Begin teardown, returning the value to pass to `on_idle`.
    pub fn release(&mut self) -> Option<S> {
        match mem::replace(&mut self.state, ContextState::Vacant) {
            ContextState::Ready(shared) => {
                self.state = ContextState::Releasing(Vec::new());
                Some(shared)
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    pub fn released(&mut self) {
        if let ContextState::Releasing(waiters) =
            mem::replace(&mut self.state, ContextState::Vacant)
        {
            wake(waiters);
        }
    }
}

fn wake(waiters: Vec<WaitResponder<()>>) {
    for waiter in waiters {
        waiter.send(()).unwrap_or(());
    }
}
