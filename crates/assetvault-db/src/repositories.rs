//! Repository implementations over any [`Store`].
//!
//! One generic live repository and one generic archive repository serve all
//! entity kinds; kind-specific extras (item status history) are inherent
//! methods on the concrete instantiation.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use assetvault_core::kinds::ITEM_STATUS_HISTORY;
use assetvault_core::{
    from_record, to_record, ArchiveRepository, Archived, EntityKind, Error, Item, ItemStatus,
    LiveRepository, Result, StatusHistory,
};

use crate::engine::ArchiveEngine;
use crate::store::{Store, StoreSession};

/// Commit a read-only or single-step session and hand back its result.
async fn complete<T>(session: Box<dyn StoreSession>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if session.is_transactional() {
                session.rollback().await?;
            }
            Err(err)
        }
    }
}

// =============================================================================
// LIVE TABLE
// =============================================================================

/// Live-side repository for entity kind `K`.
pub struct LiveTable<K> {
    engine: ArchiveEngine,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for LiveTable<K> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: EntityKind> LiveTable<K> {
    /// Create a repository that archives through `engine`.
    pub fn new(engine: ArchiveEngine) -> Self {
        Self {
            engine,
            _kind: PhantomData,
        }
    }

    fn store(&self) -> &Arc<dyn Store> {
        self.engine.store()
    }
}

#[async_trait]
impl<K: EntityKind> LiveRepository<K> for LiveTable<K> {
    async fn create(&self, record: K) -> Result<K> {
        let mut session = self.store().session().await?;
        let result = async {
            let row = to_record(&record)?;
            self.engine
                .check_references::<K>(session.as_mut(), &row)
                .await?;
            let id = session
                .insert_generated(K::LIVE_TABLE, K::KEY, &row)
                .await?;
            let stored = session
                .fetch_by_key(K::LIVE_TABLE, K::KEY, id, false)
                .await?
                .ok_or_else(|| {
                    Error::Internal(format!("{} {} vanished after insert", K::NAME, id))
                })?;
            from_record::<K>(stored)
        }
        .await;
        complete(session, result).await
    }

    async fn update(&self, record: &K) -> Result<Option<K>> {
        let mut session = self.store().session().await?;
        let result = async {
            let row = to_record(record)?;
            self.engine
                .check_references::<K>(session.as_mut(), &row)
                .await?;
            if !session.update(K::LIVE_TABLE, K::KEY, &row).await? {
                return Ok(None);
            }
            session
                .fetch_by_key(K::LIVE_TABLE, K::KEY, record.id(), false)
                .await?
                .map(from_record::<K>)
                .transpose()
        }
        .await;
        complete(session, result).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<K>> {
        let mut session = self.store().session().await?;
        let result = match session.fetch_by_key(K::LIVE_TABLE, K::KEY, id, false).await {
            Ok(row) => row.map(from_record::<K>).transpose(),
            Err(err) => Err(err),
        };
        complete(session, result).await
    }

    async fn get_all(&self) -> Result<Vec<K>> {
        let mut session = self.store().session().await?;
        let result: Result<Vec<K>> = match session.fetch_all(K::LIVE_TABLE, K::KEY).await {
            Ok(rows) => rows.into_iter().map(from_record::<K>).collect(),
            Err(err) => Err(err),
        };
        complete(session, result).await
    }

    async fn archive_by_id(&self, id: i64, note: &str) -> Result<Option<Archived<K>>> {
        self.engine.archive::<K>(id, note).await
    }
}

impl LiveTable<Item> {
    /// Change an item's status and append the change to its history.
    ///
    /// Returns the new history row, or `None` if the item does not exist.
    pub async fn record_status(
        &self,
        item_id: i64,
        status: ItemStatus,
        note: Option<&str>,
    ) -> Result<Option<StatusHistory>> {
        let mut session = self.store().session().await?;
        let result = async {
            let Some(row) = session
                .fetch_by_key(Item::LIVE_TABLE, Item::KEY, item_id, true)
                .await?
            else {
                return Ok(None);
            };
            let now = Utc::now();
            let mut item: Item = from_record(row)?;
            item.status = status;
            item.updated_at = now;
            session
                .update(Item::LIVE_TABLE, Item::KEY, &to_record(&item)?)
                .await?;

            let entry = StatusHistory {
                id: 0,
                item_id,
                status,
                note: note.map(str::to_string),
                changed_at: now,
            };
            let history = ITEM_STATUS_HISTORY;
            let id = session
                .insert_generated(history.live_table, history.key, &to_record(&entry)?)
                .await?;
            session
                .fetch_by_key(history.live_table, history.key, id, false)
                .await?
                .map(from_record::<StatusHistory>)
                .transpose()
        }
        .await;
        let result = complete(session, result).await?;
        if let Some(entry) = &result {
            info!(
                subsystem = "db",
                component = "item_repository",
                op = "record_status",
                entity_kind = Item::NAME,
                entity_id = item_id,
                status = %entry.status,
                "Item status recorded"
            );
        }
        Ok(result)
    }

    /// Status history of a live item, oldest first.
    pub async fn status_history(&self, item_id: i64) -> Result<Vec<StatusHistory>> {
        status_history_from(self.store(), ITEM_STATUS_HISTORY.live_table, item_id).await
    }
}

// =============================================================================
// ARCHIVE TABLE
// =============================================================================

/// Archive-side repository for entity kind `K`.
pub struct ArchiveTable<K> {
    engine: ArchiveEngine,
    _kind: PhantomData<fn() -> K>,
}

impl<K> Clone for ArchiveTable<K> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: EntityKind> ArchiveTable<K> {
    /// Create a repository that restores and purges through `engine`.
    pub fn new(engine: ArchiveEngine) -> Self {
        Self {
            engine,
            _kind: PhantomData,
        }
    }

    fn store(&self) -> &Arc<dyn Store> {
        self.engine.store()
    }
}

#[async_trait]
impl<K: EntityKind> ArchiveRepository<K> for ArchiveTable<K> {
    async fn find_by_id(&self, id: i64) -> Result<Option<Archived<K>>> {
        let mut session = self.store().session().await?;
        let result = match session
            .fetch_by_key(K::ARCHIVE_TABLE, K::KEY, id, false)
            .await
        {
            Ok(row) => row.map(from_record::<Archived<K>>).transpose(),
            Err(err) => Err(err),
        };
        complete(session, result).await
    }

    async fn get_all(&self) -> Result<Vec<Archived<K>>> {
        let mut session = self.store().session().await?;
        let result: Result<Vec<Archived<K>>> =
            match session.fetch_all(K::ARCHIVE_TABLE, K::KEY).await {
                Ok(rows) => rows.into_iter().map(from_record::<Archived<K>>).collect(),
                Err(err) => Err(err),
            };
        complete(session, result).await
    }

    async fn delete_by_id(&self, id: i64) -> Result<Option<Archived<K>>> {
        self.engine.purge::<K>(id).await
    }

    async fn restore_by_id(&self, id: i64) -> Result<Option<K>> {
        self.engine.restore::<K>(id).await
    }
}

impl ArchiveTable<Item> {
    /// Status history carried by an archived item, oldest first.
    pub async fn status_history(&self, item_id: i64) -> Result<Vec<StatusHistory>> {
        status_history_from(self.store(), ITEM_STATUS_HISTORY.archive_table, item_id).await
    }
}

async fn status_history_from(
    store: &Arc<dyn Store>,
    table: &str,
    item_id: i64,
) -> Result<Vec<StatusHistory>> {
    let mut session = store.session().await?;
    let result: Result<Vec<StatusHistory>> = match session
        .fetch_by_column(
            table,
            ITEM_STATUS_HISTORY.key,
            ITEM_STATUS_HISTORY.foreign_key,
            item_id,
        )
        .await
    {
        Ok(rows) => rows.into_iter().map(from_record::<StatusHistory>).collect(),
        Err(err) => Err(err),
    };
    complete(session, result).await
}
