pub mod result_cache;

pub use result_cache::{
    spawn_sweeper, CacheError, CacheHealth, CacheStatus, DerivedKey, ResultCache,
};
