//! Repository traits consumed by callers of the archive/restore engine.
//!
//! Callers (HTTP handlers, jobs) map `Ok(None)` to "not found" and `Err` to
//! an internal failure. No method here retries.

use async_trait::async_trait;

use crate::error::Result;
use crate::kinds::EntityKind;
use crate::models::Archived;

// =============================================================================
// LIVE REPOSITORY
// =============================================================================

/// Operations on the live representation of an entity kind.
#[async_trait]
pub trait LiveRepository<K: EntityKind>: Send + Sync {
    /// Insert a new record. The store assigns the key; `record.id` is ignored.
    ///
    /// Fails with [`crate::Error::Conflict`] if a declared live reference
    /// (a loan's user) is not live.
    async fn create(&self, record: K) -> Result<K>;

    /// Overwrite every field of an existing record. `None` if it does not exist.
    async fn update(&self, record: &K) -> Result<Option<K>>;

    /// Fetch a live record by key.
    async fn find_by_id(&self, id: i64) -> Result<Option<K>>;

    /// List all live records ordered by key.
    async fn get_all(&self) -> Result<Vec<K>>;

    /// Move a live record (and its dependents) into the archive.
    ///
    /// Eligibility rules are the caller's concern; declared archive guards
    /// are still enforced.
    async fn archive_by_id(&self, id: i64, note: &str) -> Result<Option<Archived<K>>>;
}

// =============================================================================
// ARCHIVE REPOSITORY
// =============================================================================

/// Operations on the archived representation of an entity kind.
#[async_trait]
pub trait ArchiveRepository<K: EntityKind>: Send + Sync {
    /// Fetch an archived record by key.
    async fn find_by_id(&self, id: i64) -> Result<Option<Archived<K>>>;

    /// List all archived records ordered by key.
    async fn get_all(&self) -> Result<Vec<Archived<K>>>;

    /// Permanently remove an archived record and its archived dependents.
    ///
    /// Returns the removed record, or `None` if nothing was archived under
    /// `id`; calling it twice is harmless.
    async fn delete_by_id(&self, id: i64) -> Result<Option<Archived<K>>>;

    /// Move an archived record (and its dependents) back to live storage
    /// under its original key.
    async fn restore_by_id(&self, id: i64) -> Result<Option<K>>;
}
