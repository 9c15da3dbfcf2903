use std::fmt::{self, Debug, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_channel::oneshot;

pub use self::oneshot::Canceled;

/// Create a single-use responder and the `Waiter` it resolves.
pub fn waiter_pair<T>() -> (WaitResponder<T>, Waiter<T>) {
    let (sender, receiver) = oneshot::channel();
    (WaitResponder { sender }, Waiter { receiver })
}

pub struct WaitResponder<T> {
    sender: oneshot::Sender<T>,
}

impl<T> WaitResponder<T> {
    pub fn is_canceled(&self) -> bool {
        self.sender.is_canceled()
    }

    /// Resolve the waiter. The value is returned if the waiter was dropped.
    pub fn send(self, resolve: T) -> Result<(), T> {
        self.sender.send(resolve)
    }
}

impl<T> Debug for WaitResponder<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitResponder")
            .field("is_canceled", &self.is_canceled())
            .finish()
    }
}

/// Resolves to the value sent by the paired `WaitResponder`, or `Canceled`
/// if the responder was dropped first.
pub struct Waiter<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Debug for Waiter<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Waiter").finish()
    }
}

impl<T> Future for Waiter<T> {
    type Output = Result<T, Canceled>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx)
    }
}
