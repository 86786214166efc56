//! # assetvault-db
//!
//! Storage layer and archive/restore engine for assetvault.
//!
//! This crate provides:
//! - Connection pool management and environment configuration
//! - A storage abstraction with PostgreSQL and in-memory backends
//! - Identity-preserving writes for restoring records under their old keys
//! - The archive/restore engine with dependent cascading
//! - Live and archive repositories for every entity kind
//!
//! ## Example
//!
//! ```rust,ignore
//! use assetvault_db::{ArchiveRepository, Database, DatabaseConfig, LiveRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect_with_config(DatabaseConfig::from_env()?).await?;
//!
//!     if let Some(archived) = db.items.archive_by_id(42, "written off").await? {
//!         println!("Archived {} at {}", archived.record.name, archived.delete_time);
//!     }
//!     let restored = db.archived_items.restore_by_id(42).await?;
//!     println!("Restored: {:?}", restored.map(|item| item.id));
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod cascade;
pub mod config;
pub mod engine;
pub mod identifiers;
pub mod memory;
pub mod pg_store;
pub mod pool;
pub mod repositories;
pub mod store;
pub mod writer;

#[cfg(test)]
mod tests;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use assetvault_core::*;

pub use config::DatabaseConfig;
pub use engine::{ArchiveEngine, EngineOptions};
pub use identifiers::{quote_identifier, validate_identifier};
pub use memory::MemoryStore;
pub use pg_store::PgStore;
pub use pool::{create_pool, create_pool_with_config, PoolConfig, PoolHealth};
pub use repositories::{ArchiveTable, LiveTable};
pub use store::{Store, StoreCapabilities, StoreSession};
pub use writer::with_preserved_key;

/// Combined database context with the engine and all repositories.
#[derive(Clone)]
pub struct Database {
    /// PostgreSQL pool, when backed by PostgreSQL.
    pool: Option<sqlx::PgPool>,
    /// Archive/restore engine shared by every repository.
    pub engine: ArchiveEngine,
    pub items: LiveTable<Item>,
    pub item_groups: LiveTable<ItemGroup>,
    pub item_types: LiveTable<ItemType>,
    pub loans: LiveTable<Loan>,
    pub requests: LiveTable<Request>,
    pub users: LiveTable<User>,
    pub archived_items: ArchiveTable<Item>,
    pub archived_item_groups: ArchiveTable<ItemGroup>,
    pub archived_item_types: ArchiveTable<ItemType>,
    pub archived_loans: ArchiveTable<Loan>,
    pub archived_requests: ArchiveTable<Request>,
    pub archived_users: ArchiveTable<User>,
}

impl Database {
    /// Create a Database over any store with default engine options.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    /// Create a Database over any store with explicit engine options.
    pub fn with_options(store: Arc<dyn Store>, options: EngineOptions) -> Self {
        Self::assemble(ArchiveEngine::with_options(store, options), None)
    }

    /// Create a Database from an existing PostgreSQL pool.
    pub fn from_pool(pool: sqlx::PgPool) -> Self {
        Self::from_pool_with_options(pool, EngineOptions::default())
    }

    fn from_pool_with_options(pool: sqlx::PgPool, options: EngineOptions) -> Self {
        let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
        Self::assemble(ArchiveEngine::with_options(store, options), Some(pool))
    }

    /// Create a Database backed by a fresh non-transactional in-memory store.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn assemble(engine: ArchiveEngine, pool: Option<sqlx::PgPool>) -> Self {
        Self {
            pool,
            items: LiveTable::new(engine.clone()),
            item_groups: LiveTable::new(engine.clone()),
            item_types: LiveTable::new(engine.clone()),
            loans: LiveTable::new(engine.clone()),
            requests: LiveTable::new(engine.clone()),
            users: LiveTable::new(engine.clone()),
            archived_items: ArchiveTable::new(engine.clone()),
            archived_item_groups: ArchiveTable::new(engine.clone()),
            archived_item_types: ArchiveTable::new(engine.clone()),
            archived_loans: ArchiveTable::new(engine.clone()),
            archived_requests: ArchiveTable::new(engine.clone()),
            archived_users: ArchiveTable::new(engine.clone()),
            engine,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::from_pool(pool))
    }

    /// Connect using a full configuration (pool and engine options).
    pub async fn connect_with_config(config: DatabaseConfig) -> Result<Self> {
        let pool = create_pool_with_config(&config.url, config.pool).await?;
        Ok(Self::from_pool_with_options(pool, config.engine))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| Error::Config("migrations require a PostgreSQL store".to_string()))?;
        sqlx::migrate!("../../migrations")
            .run(pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool, if backed by PostgreSQL.
    pub fn pool(&self) -> Option<&sqlx::PgPool> {
        self.pool.as_ref()
    }

    /// The store all repositories share.
    pub fn store(&self) -> &Arc<dyn Store> {
        self.engine.store()
    }
}
