//! Storage backend abstraction.
//!
//! The archive/restore engine never asks which backend it is talking to.
//! Backends describe themselves through [`StoreCapabilities`] and hand out
//! [`StoreSession`]s; a session is one connection's worth of work and is
//! transactional exactly when the backend supports transactions.

use async_trait::async_trait;

use assetvault_core::{Record, Result};

/// What a storage backend can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreCapabilities {
    transactions: bool,
    generated_keys: bool,
}

impl StoreCapabilities {
    pub const fn new(transactions: bool, generated_keys: bool) -> Self {
        Self {
            transactions,
            generated_keys,
        }
    }

    /// Sessions group writes atomically and can roll back.
    pub const fn supports_transactions(&self) -> bool {
        self.transactions
    }

    /// Live tables refuse caller-supplied keys unless explicit-key insert
    /// mode is switched on for the table.
    ///
    /// When false, switching the mode is a pass-through.
    pub const fn enforces_generated_keys(&self) -> bool {
        self.generated_keys
    }
}

/// A storage backend holding the live and archive tables.
#[async_trait]
pub trait Store: Send + Sync {
    /// Describe the backend.
    fn capabilities(&self) -> StoreCapabilities;

    /// Open a session. It is transactional when
    /// [`StoreCapabilities::supports_transactions`] is true.
    async fn session(&self) -> Result<Box<dyn StoreSession>>;
}

/// One unit of work against a store.
///
/// Without transaction support every write is applied immediately and
/// [`StoreSession::rollback`] cannot undo it.
#[async_trait]
pub trait StoreSession: Send {
    /// Capabilities of the store this session belongs to.
    fn capabilities(&self) -> StoreCapabilities;

    /// Whether writes made through this session can still be rolled back.
    fn is_transactional(&self) -> bool {
        self.capabilities().supports_transactions()
    }

    /// Fetch the row whose `key` column equals `id`.
    ///
    /// With `lock`, transactional backends hold the row until the session
    /// ends so concurrent movers of the same row serialize.
    async fn fetch_by_key(
        &mut self,
        table: &str,
        key: &str,
        id: i64,
        lock: bool,
    ) -> Result<Option<Record>>;

    /// Fetch all rows whose `column` equals `value`, ordered by `key`.
    async fn fetch_by_column(
        &mut self,
        table: &str,
        key: &str,
        column: &str,
        value: i64,
    ) -> Result<Vec<Record>>;

    /// Fetch every row of a table ordered by `key`.
    async fn fetch_all(&mut self, table: &str, key: &str) -> Result<Vec<Record>>;

    /// Count rows whose `column` equals `value`.
    async fn count_by_column(&mut self, table: &str, column: &str, value: i64) -> Result<i64>;

    /// Insert a row with the key it carries.
    ///
    /// On backends that enforce generated keys this fails unless explicit-key
    /// insert mode is on for `table`.
    async fn insert(&mut self, table: &str, key: &str, record: &Record) -> Result<()>;

    /// Insert a row letting the store assign the key. Any key in `record` is
    /// ignored. Returns the assigned key.
    async fn insert_generated(&mut self, table: &str, key: &str, record: &Record) -> Result<i64>;

    /// Overwrite the row identified by `record[key]`. Returns false if no row
    /// matched.
    async fn update(&mut self, table: &str, key: &str, record: &Record) -> Result<bool>;

    /// Delete the row whose `key` equals `id`. Returns rows affected.
    async fn delete_by_key(&mut self, table: &str, key: &str, id: i64) -> Result<u64>;

    /// Delete all rows whose `column` equals `value`. Returns rows affected.
    async fn delete_by_column(&mut self, table: &str, column: &str, value: i64) -> Result<u64>;

    /// Switch explicit-key insert mode for `table` on or off.
    ///
    /// Use [`crate::writer::with_preserved_key`] rather than calling this
    /// directly; it guarantees the mode is switched back off.
    async fn set_explicit_key_insert(&mut self, table: &str, key: &str, enabled: bool)
        -> Result<()>;

    /// Make the session's writes permanent.
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Discard the session's writes, where the backend can.
    async fn rollback(self: Box<Self>) -> Result<()>;
}
