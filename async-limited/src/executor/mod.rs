use futures_lite::future::Boxed as BoxFuture;

use crate::pool::ConfigError;

#[cfg(feature = "global-exec")]
mod global;

#[cfg(feature = "global-exec")]
pub use self::global::GlobalExecutor;

#[cfg(feature = "global-exec")]
/// Returns a default [`Executor`] instance to use when constructing a resource
/// pool.
pub fn default_executor() -> Result<Box<dyn Executor>, ConfigError> {
    Ok(Box::new(self::global::GlobalExecutor))
}

#[cfg(not(any(feature = "global-exec")))]
/// Returns a default [`Executor`] instance to use when constructing a resource
/// pool.
pub fn default_executor() -> Result<Box<dyn Executor>, ConfigError> {
    Err(ConfigError("No default executor is provided".to_owned()))
}

/// Defines a pluggable executor for Futures evaluated within the context of the
/// resource pool: resource construction, acquisition handoff, idle expiry and
/// background release of dropped handles.
///
/// The pool may call `spawn_ok` while holding its internal lock, so the task
/// must not be polled before `spawn_ok` returns.
pub trait Executor: Send + Sync {
    /// Spawn a static, boxed Future with no return value
    fn spawn_ok(&self, task: BoxFuture<()>);
}

impl<X: Executor + ?Sized> Executor for std::sync::Arc<X> {
    fn spawn_ok(&self, task: BoxFuture<()>) {
        (**self).spawn_ok(task)
    }
}
