//! Raw data sources: the hardware status tool and the cache server.

pub mod cache;
pub mod hardware;

pub use cache::{CacheClient, MemcachedClient};
pub use hardware::{CommandRunner, HardwareSource, TokioCommandRunner};
