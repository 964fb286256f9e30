pub mod catalog;
pub mod memory;
pub mod postgres;
pub mod redis;

pub use catalog::{CourseCatalog, PgCourseCatalog};
pub use memory::InMemoryCatalog;
pub use postgres::{create_pool, run_migrations};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;

#[cfg(test)]
pub use catalog::MockCourseCatalog;
