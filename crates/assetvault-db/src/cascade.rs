//! Dependent-record cascading.
//!
//! Children declared by an entity kind move with their parent in the same
//! session. Every child keeps its own key and its link to the parent, and
//! the source set is removed only after all destination rows are written.

use tracing::trace;

use assetvault_core::{record_i64, Dependent, Error, Record, Result};

use crate::store::StoreSession;
use crate::writer::with_preserved_key;

/// The rows of one dependent table that belong to one parent.
#[derive(Debug, Clone)]
pub struct DependentRows {
    pub dependent: &'static Dependent,
    pub rows: Vec<Record>,
}

/// Which storage area rows are being read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Live,
    Archive,
}

impl Side {
    fn table(self, dependent: &Dependent) -> &'static str {
        match self {
            Side::Live => dependent.live_table,
            Side::Archive => dependent.archive_table,
        }
    }
}

/// Load every declared dependent of `parent_id` from one side.
pub async fn load_dependents(
    session: &mut dyn StoreSession,
    dependents: &'static [Dependent],
    side: Side,
    parent_id: i64,
) -> Result<Vec<DependentRows>> {
    let mut sets = Vec::with_capacity(dependents.len());
    for dependent in dependents {
        let rows = session
            .fetch_by_column(
                side.table(dependent),
                dependent.key,
                dependent.foreign_key,
                parent_id,
            )
            .await?;
        sets.push(DependentRows { dependent, rows });
    }
    Ok(sets)
}

/// Total number of rows across dependent sets.
pub fn row_count(sets: &[DependentRows]) -> usize {
    sets.iter().map(|set| set.rows.len()).sum()
}

/// Check a mapped child still points at its parent.
fn ensure_linked(dependent: &Dependent, record: &Record, parent_id: i64) -> Result<()> {
    let linked = record_i64(record, dependent.foreign_key)?;
    if linked != parent_id {
        return Err(Error::Internal(format!(
            "{} row links to {} but parent is {}",
            dependent.name, linked, parent_id
        )));
    }
    Ok(())
}

/// Remove the source rows and confirm exactly the moved set was removed.
async fn remove_source(
    session: &mut dyn StoreSession,
    table: &str,
    dependent: &Dependent,
    parent_id: i64,
    expected: usize,
) -> Result<()> {
    let removed = session
        .delete_by_column(table, dependent.foreign_key, parent_id)
        .await?;
    if removed != expected as u64 {
        return Err(Error::Conflict(format!(
            "{} rows for parent {} changed during the move: moved {}, removed {}",
            dependent.name, parent_id, expected, removed
        )));
    }
    Ok(())
}

/// Write archived children as live rows under their original keys, then
/// delete the archived children.
pub async fn restore_dependents(
    session: &mut dyn StoreSession,
    parent_id: i64,
    sets: Vec<DependentRows>,
) -> Result<usize> {
    let mut moved = 0;
    for DependentRows { dependent, rows } in sets {
        let expected = rows.len();
        for row in rows {
            let live = (dependent.to_live)(row)?;
            ensure_linked(dependent, &live, parent_id)?;
            trace!(
                subsystem = "db",
                component = "cascade",
                op = "restore",
                db_table = dependent.live_table,
                "Restoring dependent row"
            );
            let table = dependent.live_table;
            let key = dependent.key;
            with_preserved_key(session, table, key, move |s| {
                Box::pin(async move { s.insert(table, key, &live).await })
            })
            .await?;
        }
        remove_source(
            session,
            dependent.archive_table,
            dependent,
            parent_id,
            expected,
        )
        .await?;
        moved += expected;
    }
    Ok(moved)
}

/// Write live children into the archive under their original keys, then
/// delete the live children.
///
/// Archive tables never generate keys, so no explicit-key mode is needed.
pub async fn archive_dependents(
    session: &mut dyn StoreSession,
    parent_id: i64,
    sets: Vec<DependentRows>,
) -> Result<usize> {
    let mut moved = 0;
    for DependentRows { dependent, rows } in sets {
        let expected = rows.len();
        for row in rows {
            let archived = (dependent.to_archived)(row)?;
            ensure_linked(dependent, &archived, parent_id)?;
            session
                .insert(dependent.archive_table, dependent.key, &archived)
                .await?;
        }
        remove_source(session, dependent.live_table, dependent, parent_id, expected).await?;
        moved += expected;
    }
    Ok(moved)
}

/// Delete all archived children of `parent_id`. Returns rows removed.
pub async fn purge_dependents(
    session: &mut dyn StoreSession,
    dependents: &'static [Dependent],
    parent_id: i64,
) -> Result<u64> {
    let mut removed = 0;
    for dependent in dependents {
        removed += session
            .delete_by_column(dependent.archive_table, dependent.foreign_key, parent_id)
            .await?;
    }
    Ok(removed)
}
