//! Archive/restore engine.
//!
//! Moves a record of any [`EntityKind`] between its live and archive tables,
//! together with every declared dependent, inside one store session:
//!
//! - **Archive**: live row → archived row (plus note and timestamp), children
//!   copied into their archive tables, then live children and parent deleted.
//! - **Restore**: archived row → live row under its original key (explicit-key
//!   insert mode), children restored the same way, then archived children and
//!   parent deleted. Every live reference the kind declares must resolve
//!   first.
//! - **Purge**: archived row and archived children deleted for good.
//!
//! A missing source record returns `Ok(None)` and writes nothing. When the
//! store supports transactions, any failure rolls the whole move back and the
//! error is returned unchanged. Without transactions the steps run in order
//! and a failure part-way leaves the partial state in place.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use assetvault_core::defaults::{LOCK_SOURCE_ROWS, SLOW_OPERATION_MS};
use assetvault_core::{
    archive_record, from_record, record_i64, restore_record, ArchiveStamp, Archived, EntityKind,
    Error, Record, Result,
};

use crate::cascade::{self, Side};
use crate::store::{Store, StoreSession};
use crate::writer::with_preserved_key;

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Lock the source row for the duration of the move.
    pub lock_source_rows: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            lock_source_rows: LOCK_SOURCE_ROWS,
        }
    }
}

impl EngineOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether source rows are locked.
    pub fn lock_source_rows(mut self, lock: bool) -> Self {
        self.lock_source_rows = lock;
        self
    }
}

/// Orchestrates archive, restore and purge for every entity kind.
#[derive(Clone)]
pub struct ArchiveEngine {
    store: Arc<dyn Store>,
    options: EngineOptions,
}

impl ArchiveEngine {
    /// Create an engine over `store` with default options.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_options(store, EngineOptions::default())
    }

    /// Create an engine over `store` with explicit options.
    pub fn with_options(store: Arc<dyn Store>, options: EngineOptions) -> Self {
        Self { store, options }
    }

    /// The store this engine writes to.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Move live record `id` of kind `K` into the archive with `note`.
    ///
    /// Returns the archived record, or `None` if no live record has that key.
    /// Fails with [`Error::Conflict`] when one of the kind's archive guards
    /// finds live references.
    pub async fn archive<K: EntityKind>(&self, id: i64, note: &str) -> Result<Option<Archived<K>>> {
        let start = Instant::now();
        let stamp = ArchiveStamp::now(note);
        let mut session = self.store.session().await?;
        let result = self.archive_in::<K>(session.as_mut(), id, &stamp).await;
        self.finish(session, result, K::NAME, "archive", id, start).await
    }

    /// Move archived record `id` of kind `K` back to live storage under the
    /// same key.
    ///
    /// Returns the live record, or `None` if nothing is archived under `id`.
    /// Fails with [`Error::Conflict`] when the record points at a row that is
    /// not live, such as a loan whose user is archived.
    pub async fn restore<K: EntityKind>(&self, id: i64) -> Result<Option<K>> {
        let start = Instant::now();
        let mut session = self.store.session().await?;
        let result = self.restore_in::<K>(session.as_mut(), id).await;
        self.finish(session, result, K::NAME, "restore", id, start).await
    }

    /// Permanently delete archived record `id` of kind `K` and its archived
    /// dependents.
    ///
    /// Returns the deleted record, or `None` if nothing is archived under `id`.
    pub async fn purge<K: EntityKind>(&self, id: i64) -> Result<Option<Archived<K>>> {
        let start = Instant::now();
        let mut session = self.store.session().await?;
        let result = self.purge_in::<K>(session.as_mut(), id).await;
        self.finish(session, result, K::NAME, "purge", id, start).await
    }

    async fn archive_in<K: EntityKind>(
        &self,
        session: &mut dyn StoreSession,
        id: i64,
        stamp: &ArchiveStamp,
    ) -> Result<Option<Archived<K>>> {
        let Some(live) = session
            .fetch_by_key(K::LIVE_TABLE, K::KEY, id, self.options.lock_source_rows)
            .await?
        else {
            debug!(
                subsystem = "db",
                component = "archive_engine",
                op = "archive",
                entity_kind = K::NAME,
                entity_id = id,
                "No live record to archive"
            );
            return Ok(None);
        };

        for guard in K::GUARDS {
            let references = session.count_by_column(guard.table, guard.column, id).await?;
            if references > 0 {
                return Err(Error::Conflict(format!(
                    "{} {} is still referenced by {} live {} row(s)",
                    K::NAME,
                    id,
                    references,
                    guard.table
                )));
            }
        }

        let archived = archive_record::<K>(live, stamp)?;
        let children = cascade::load_dependents(session, K::DEPENDENTS, Side::Live, id).await?;

        session.insert(K::ARCHIVE_TABLE, K::KEY, &archived).await?;
        let moved = cascade::archive_dependents(session, id, children).await?;
        session.delete_by_key(K::LIVE_TABLE, K::KEY, id).await?;

        debug!(
            subsystem = "db",
            component = "archive_engine",
            op = "archive",
            entity_kind = K::NAME,
            entity_id = id,
            dependent_count = moved,
            "Archive writes complete"
        );
        Ok(Some(from_record(archived)?))
    }

    async fn restore_in<K: EntityKind>(
        &self,
        session: &mut dyn StoreSession,
        id: i64,
    ) -> Result<Option<K>> {
        let Some(archived) = session
            .fetch_by_key(K::ARCHIVE_TABLE, K::KEY, id, self.options.lock_source_rows)
            .await?
        else {
            debug!(
                subsystem = "db",
                component = "archive_engine",
                op = "restore",
                entity_kind = K::NAME,
                entity_id = id,
                "No archived record to restore"
            );
            return Ok(None);
        };

        let live = restore_record::<K>(archived)?;
        self.check_references::<K>(session, &live).await?;
        let restored: K = from_record(live.clone())?;
        let children = cascade::load_dependents(session, K::DEPENDENTS, Side::Archive, id).await?;

        with_preserved_key(session, K::LIVE_TABLE, K::KEY, move |s| {
            Box::pin(async move { s.insert(K::LIVE_TABLE, K::KEY, &live).await })
        })
        .await?;
        let moved = cascade::restore_dependents(session, id, children).await?;
        session.delete_by_key(K::ARCHIVE_TABLE, K::KEY, id).await?;

        debug!(
            subsystem = "db",
            component = "archive_engine",
            op = "restore",
            entity_kind = K::NAME,
            entity_id = id,
            dependent_count = moved,
            "Restore writes complete"
        );
        Ok(Some(restored))
    }

    /// Fail with [`Error::Conflict`] unless every [`EntityKind::REFERENCES`]
    /// target of `record` is a live row. Targets are locked like source rows.
    pub(crate) async fn check_references<K: EntityKind>(
        &self,
        session: &mut dyn StoreSession,
        record: &Record,
    ) -> Result<()> {
        for reference in K::REFERENCES {
            let target = record_i64(record, reference.column)?;
            let found = session
                .fetch_by_key(
                    reference.table,
                    reference.key,
                    target,
                    self.options.lock_source_rows,
                )
                .await?;
            if found.is_none() {
                return Err(Error::Conflict(format!(
                    "{} {} references {} {} which is not live",
                    K::NAME,
                    record_i64(record, K::KEY)?,
                    reference.table,
                    target
                )));
            }
        }
        Ok(())
    }

    async fn purge_in<K: EntityKind>(
        &self,
        session: &mut dyn StoreSession,
        id: i64,
    ) -> Result<Option<Archived<K>>> {
        let Some(archived) = session
            .fetch_by_key(K::ARCHIVE_TABLE, K::KEY, id, self.options.lock_source_rows)
            .await?
        else {
            return Ok(None);
        };
        let archived: Archived<K> = from_record(archived)?;

        let removed = cascade::purge_dependents(session, K::DEPENDENTS, id).await?;
        session.delete_by_key(K::ARCHIVE_TABLE, K::KEY, id).await?;

        debug!(
            subsystem = "db",
            component = "archive_engine",
            op = "purge",
            entity_kind = K::NAME,
            entity_id = id,
            dependent_count = removed,
            "Purge writes complete"
        );
        Ok(Some(archived))
    }

    /// Commit on success, roll back on failure, and log the outcome.
    async fn finish<T>(
        &self,
        session: Box<dyn StoreSession>,
        result: Result<Option<T>>,
        kind: &'static str,
        op: &'static str,
        id: i64,
        start: Instant,
    ) -> Result<Option<T>> {
        let transactional = session.is_transactional();
        match result {
            Ok(value) => {
                session.commit().await?;
                let duration_ms = start.elapsed().as_millis() as u64;
                if value.is_some() {
                    info!(
                        subsystem = "db",
                        component = "archive_engine",
                        op,
                        entity_kind = kind,
                        entity_id = id,
                        transactional,
                        duration_ms,
                        slow = duration_ms > SLOW_OPERATION_MS,
                        success = true,
                        "Entity move completed"
                    );
                }
                Ok(value)
            }
            Err(err) => {
                if transactional {
                    warn!(
                        subsystem = "db",
                        component = "archive_engine",
                        op,
                        entity_kind = kind,
                        entity_id = id,
                        error = %err,
                        "Entity move failed, rolling back"
                    );
                    if let Err(rollback_err) = session.rollback().await {
                        error!(
                            subsystem = "db",
                            component = "archive_engine",
                            op,
                            entity_kind = kind,
                            entity_id = id,
                            error = %rollback_err,
                            "Rollback failed"
                        );
                    }
                } else {
                    warn!(
                        subsystem = "db",
                        component = "archive_engine",
                        op,
                        entity_kind = kind,
                        entity_id = id,
                        transactional,
                        error = %err,
                        "Entity move failed without a transaction; partial writes remain"
                    );
                    drop(session);
                }
                Err(err)
            }
        }
    }
}
