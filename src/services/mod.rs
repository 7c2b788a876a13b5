// Service exports
pub mod cache;
pub mod gemini;
pub mod memory;
pub mod postgres;
pub mod retention;
pub mod seed;
pub mod store;

pub use cache::{CacheStats, CachedCatalog};
pub use gemini::GeminiClient;
pub use memory::MemoryStore;
pub use postgres::{PostgresClient, PostgresError};
pub use retention::{run_retention_once, spawn_retention_job};
pub use seed::{load_seed_file, seed_catalog, SeedError};
pub use store::{CatalogWriter, MatchStore, ProfileWriter, PurgeStats, ResultReader, RetentionStore};
