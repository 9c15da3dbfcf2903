mod acquire;
pub use acquire::{Acquire, AcquireOptions, Priority};

mod config;
pub use config::PoolConfig;

mod context;

mod error;
pub use error::{ConfigError, PoolError};

mod lifecycle;

mod pool;
pub(crate) use pool::PoolInner;
pub use pool::Pool;

mod queue;

pub(crate) mod wait;
