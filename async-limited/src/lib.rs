//! An async resource pool which bounds the number of leased resources,
//! throttles their construction, expires idle ones and manages a shared
//! context for the lifetime of the live set.

mod executor;
#[cfg(feature = "global-exec")]
pub use self::executor::GlobalExecutor;
pub use self::executor::{default_executor, Executor};

mod limited;
pub use self::limited::{limited, Limited};

mod pool;
pub use self::pool::{
    Acquire, AcquireOptions, ConfigError, Pool, PoolConfig, PoolError, Priority,
};

mod resource;
pub use self::resource::Handle;
