use thiserror::Error;

/// An error produced by the resource pool or one of its handles.
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The resource pool is closed
    #[error("The resource pool is closed")]
    PoolClosed,
    /// The acquire timed out. The acquisition itself still completes and the
    /// resource is released back to the pool.
    #[error("The request timed out")]
    Timeout,
    /// The handle no longer holds a resource
    #[error("The resource has already been freed")]
    AlreadyFreed,
    /// Wraps an error result from one of the pool's callbacks
    #[error("Resource callback error: {0}")]
    Callback(E),
}

impl<E> PoolError<E> {
    /// Returns the wrapped callback error, if any.
    pub fn into_callback(self) -> Option<E> {
        match self {
            Self::Callback(err) => Some(err),
            _ => None,
        }
    }
}

/// A configuration error.
#[derive(Debug, Error)]
#[error("Config error: {0}")]
pub struct ConfigError(pub String);
