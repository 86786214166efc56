//! In-memory storage backend for tests.
//!
//! By default the store behaves like an ORM's in-memory test provider: no
//! transactions, every write lands immediately, and keys are never enforced
//! so explicit-key insert mode is a pass-through. Builders switch on a
//! transactional variant (writes are staged on a snapshot and published on
//! commit), enforcement of generated keys on chosen tables, and injected
//! insert failures.
//!
//! A transactional session holds the store lock until it ends, so sessions
//! are fully serialized.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use assetvault_core::{record_i64, Error, Record, Result};

use crate::store::{Store, StoreCapabilities, StoreSession};

/// Rows of every table plus per-table key sequences.
#[derive(Debug, Clone, Default)]
struct Tables {
    rows: BTreeMap<String, BTreeMap<i64, Record>>,
    sequences: BTreeMap<String, i64>,
    /// Tables currently accepting explicit keys.
    explicit_keys: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Tables,
    /// Inserts into these tables fail.
    failing_inserts: BTreeSet<String>,
}

/// In-memory implementation of [`Store`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    transactional: bool,
    generated_key_tables: Arc<BTreeSet<String>>,
}

impl MemoryStore {
    /// Non-transactional store that accepts explicit keys everywhere.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose sessions are transactions.
    pub fn transactional() -> Self {
        Self {
            transactional: true,
            ..Self::default()
        }
    }

    /// Refuse explicit keys on `tables` unless explicit-key insert mode is on.
    pub fn with_generated_keys<'a>(mut self, tables: impl IntoIterator<Item = &'a str>) -> Self {
        self.generated_key_tables = Arc::new(tables.into_iter().map(str::to_string).collect());
        self
    }

    /// Make every subsequent insert into `table` fail.
    pub async fn fail_inserts_into(&self, table: &str) {
        self.state
            .lock()
            .await
            .failing_inserts
            .insert(table.to_string());
    }

    /// Stop failing inserts into any table.
    pub async fn clear_failures(&self) {
        self.state.lock().await.failing_inserts.clear();
    }

    /// Number of committed rows in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        self.state
            .lock()
            .await
            .tables
            .rows
            .get(table)
            .map_or(0, BTreeMap::len)
    }

    /// Committed row of `table` with key `id`.
    pub async fn row(&self, table: &str, id: i64) -> Option<Record> {
        self.state
            .lock()
            .await
            .tables
            .rows
            .get(table)
            .and_then(|rows| rows.get(&id))
            .cloned()
    }

    /// Whether explicit-key insert mode is currently on for `table`.
    pub async fn explicit_key_insert_enabled(&self, table: &str) -> bool {
        self.state
            .lock()
            .await
            .tables
            .explicit_keys
            .contains(table)
    }

    fn capabilities_of(&self) -> StoreCapabilities {
        StoreCapabilities::new(self.transactional, !self.generated_key_tables.is_empty())
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities_of()
    }

    async fn session(&self) -> Result<Box<dyn StoreSession>> {
        let capabilities = self.capabilities_of();
        let generated_key_tables = Arc::clone(&self.generated_key_tables);
        if self.transactional {
            let guard = Arc::clone(&self.state).lock_owned().await;
            let staged = guard.tables.clone();
            Ok(Box::new(MemorySession {
                target: SessionTarget::Staged { guard, staged },
                capabilities,
                generated_key_tables,
            }))
        } else {
            Ok(Box::new(MemorySession {
                target: SessionTarget::Direct(Arc::clone(&self.state)),
                capabilities,
                generated_key_tables,
            }))
        }
    }
}

enum SessionTarget {
    /// Writes go straight to the shared state.
    Direct(Arc<Mutex<MemoryState>>),
    /// Writes go to a private copy published on commit.
    Staged {
        guard: OwnedMutexGuard<MemoryState>,
        staged: Tables,
    },
}

/// A session on a [`MemoryStore`].
pub struct MemorySession {
    target: SessionTarget,
    capabilities: StoreCapabilities,
    generated_key_tables: Arc<BTreeSet<String>>,
}

impl MemorySession {
    /// Run `f` against the tables this session writes to.
    async fn with_tables<T>(&mut self, f: impl FnOnce(&mut Tables, &BTreeSet<String>) -> T) -> T {
        match &mut self.target {
            SessionTarget::Direct(state) => {
                let mut state = state.lock().await;
                let MemoryState {
                    tables,
                    failing_inserts,
                } = &mut *state;
                f(tables, failing_inserts)
            }
            SessionTarget::Staged { guard, staged } => f(staged, &guard.failing_inserts),
        }
    }
}

fn column_matches(record: &Record, column: &str, value: i64) -> bool {
    record.get(column).and_then(JsonValue::as_i64) == Some(value)
}

#[async_trait]
impl StoreSession for MemorySession {
    fn capabilities(&self) -> StoreCapabilities {
        self.capabilities
    }

    async fn fetch_by_key(
        &mut self,
        table: &str,
        _key: &str,
        id: i64,
        _lock: bool,
    ) -> Result<Option<Record>> {
        Ok(self
            .with_tables(|tables, _| {
                tables
                    .rows
                    .get(table)
                    .and_then(|rows| rows.get(&id))
                    .cloned()
            })
            .await)
    }

    async fn fetch_by_column(
        &mut self,
        table: &str,
        _key: &str,
        column: &str,
        value: i64,
    ) -> Result<Vec<Record>> {
        Ok(self
            .with_tables(|tables, _| {
                tables
                    .rows
                    .get(table)
                    .map(|rows| {
                        rows.values()
                            .filter(|record| column_matches(record, column, value))
                            .cloned()
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default()
            })
            .await)
    }

    async fn fetch_all(&mut self, table: &str, _key: &str) -> Result<Vec<Record>> {
        Ok(self
            .with_tables(|tables, _| {
                tables
                    .rows
                    .get(table)
                    .map(|rows| rows.values().cloned().collect::<Vec<_>>())
                    .unwrap_or_default()
            })
            .await)
    }

    async fn count_by_column(&mut self, table: &str, column: &str, value: i64) -> Result<i64> {
        let count = self
            .with_tables(|tables, _| {
                tables.rows.get(table).map_or(0, |rows| {
                    rows.values()
                        .filter(|record| column_matches(record, column, value))
                        .count()
                })
            })
            .await;
        i64::try_from(count).map_err(|e| Error::Internal(e.to_string()))
    }

    async fn insert(&mut self, table: &str, key: &str, record: &Record) -> Result<()> {
        let id = record_i64(record, key)?;
        let enforced = self.generated_key_tables.contains(table);
        self.with_tables(|tables, failing| {
            if failing.contains(table) {
                return Err(Error::Internal(format!("injected insert failure on {table}")));
            }
            if enforced && !tables.explicit_keys.contains(table) {
                return Err(Error::InvalidInput(format!(
                    "cannot insert explicit key {id} into {table} while explicit key insert is off"
                )));
            }
            let rows = tables.rows.entry(table.to_string()).or_default();
            if rows.contains_key(&id) {
                return Err(Error::Conflict(format!("duplicate key {id} in {table}")));
            }
            rows.insert(id, record.clone());
            Ok(())
        })
        .await
    }

    async fn insert_generated(&mut self, table: &str, key: &str, record: &Record) -> Result<i64> {
        self.with_tables(|tables, failing| {
            if failing.contains(table) {
                return Err(Error::Internal(format!("injected insert failure on {table}")));
            }
            let sequence = tables.sequences.entry(table.to_string()).or_insert(0);
            *sequence += 1;
            let id = *sequence;
            let rows = tables.rows.entry(table.to_string()).or_default();
            if rows.contains_key(&id) {
                return Err(Error::Conflict(format!("duplicate key {id} in {table}")));
            }
            let mut record = record.clone();
            record.insert(key.to_string(), JsonValue::from(id));
            rows.insert(id, record);
            Ok(id)
        })
        .await
    }

    async fn update(&mut self, table: &str, key: &str, record: &Record) -> Result<bool> {
        let id = record_i64(record, key)?;
        Ok(self
            .with_tables(|tables, _| {
                match tables.rows.get_mut(table).and_then(|rows| rows.get_mut(&id)) {
                    Some(existing) => {
                        for (column, value) in record {
                            existing.insert(column.clone(), value.clone());
                        }
                        true
                    }
                    None => false,
                }
            })
            .await)
    }

    async fn delete_by_key(&mut self, table: &str, _key: &str, id: i64) -> Result<u64> {
        Ok(self
            .with_tables(|tables, _| {
                tables
                    .rows
                    .get_mut(table)
                    .and_then(|rows| rows.remove(&id))
                    .map_or(0, |_| 1)
            })
            .await)
    }

    async fn delete_by_column(&mut self, table: &str, column: &str, value: i64) -> Result<u64> {
        Ok(self
            .with_tables(|tables, _| {
                let Some(rows) = tables.rows.get_mut(table) else {
                    return 0;
                };
                let before = rows.len();
                rows.retain(|_, record| !column_matches(record, column, value));
                (before - rows.len()) as u64
            })
            .await)
    }

    async fn set_explicit_key_insert(
        &mut self,
        table: &str,
        _key: &str,
        enabled: bool,
    ) -> Result<()> {
        debug!(
            subsystem = "db",
            component = "memory_store",
            op = "identity_toggle",
            db_table = table,
            enabled,
            "Switching explicit key insert mode"
        );
        self.with_tables(|tables, _| {
            if enabled {
                tables.explicit_keys.insert(table.to_string());
            } else {
                tables.explicit_keys.remove(table);
            }
        })
        .await;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        if let SessionTarget::Staged { mut guard, staged } = self.target {
            guard.tables = staged;
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        if let SessionTarget::Direct(_) = self.target {
            warn!(
                subsystem = "db",
                component = "memory_store",
                op = "rollback",
                "Rollback requested on a non-transactional session; writes already applied"
            );
        }
        Ok(())
    }
}
