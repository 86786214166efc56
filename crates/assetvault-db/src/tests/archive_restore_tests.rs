//! Archive and restore round trips across every entity kind.
//!
//! Covers: key preservation, live/archive exclusivity, status history
//! cascading, not-found results, the user/loan guard in both directions,
//! purge, and racing restores of the same key.

use std::fmt::Debug;

use super::init_tracing;
use crate::test_fixtures::{self, memory_database, strict_memory_database, ALL_TABLES};
use crate::{
    ArchiveRepository, ArchiveTable, EntityKind, Error, Item, ItemStatus, LiveRepository,
    LiveTable, MemoryStore,
};

async fn table_counts(store: &MemoryStore) -> Vec<(&'static str, usize)> {
    let mut counts = Vec::new();
    for table in ALL_TABLES {
        counts.push((*table, store.row_count(table).await));
    }
    counts
}

/// Create `n` items named "Item 1".."Item n" and return the last one.
async fn create_items(items: &LiveTable<Item>, n: usize) -> Item {
    let mut last = None;
    for i in 1..=n {
        last = Some(
            items
                .create(test_fixtures::item(&format!("Item {i}")))
                .await
                .unwrap(),
        );
    }
    last.unwrap()
}

/// Archive then restore `record` and check both directions.
async fn assert_round_trip<K>(live: &LiveTable<K>, archive: &ArchiveTable<K>, record: K)
where
    K: EntityKind + PartialEq + Debug,
{
    let created = live.create(record).await.unwrap();
    let id = created.id();

    let archived = live
        .archive_by_id(id, "end of term")
        .await
        .unwrap()
        .expect("archived record");
    assert_eq!(archived.record, created, "{} fields carried", K::NAME);
    assert_eq!(archived.archive_note, "end of term");
    assert!(live.find_by_id(id).await.unwrap().is_none());
    assert!(archive.find_by_id(id).await.unwrap().is_some());

    let restored = archive
        .restore_by_id(id)
        .await
        .unwrap()
        .expect("restored record");
    assert_eq!(restored, created, "{} restored verbatim", K::NAME);
    assert_eq!(live.find_by_id(id).await.unwrap(), Some(created));
    assert!(archive.find_by_id(id).await.unwrap().is_none());
}

// =============================================================================
// Single-record round trips
// =============================================================================

#[tokio::test]
async fn test_archive_and_restore_item_without_dependents() {
    init_tracing();
    let (db, _store) = memory_database();
    let original = create_items(&db.items, 5).await;
    assert_eq!(original.id, 5);

    let archived = db
        .items
        .archive_by_id(5, "broken screen")
        .await
        .unwrap()
        .expect("item 5 archived");
    assert_eq!(archived.archive_note, "broken screen");
    assert_eq!(archived.record, original);

    assert!(db.items.find_by_id(5).await.unwrap().is_none());
    let stored = db.archived_items.find_by_id(5).await.unwrap().unwrap();
    assert_eq!(stored.archive_note, "broken screen");
    assert_eq!(stored.delete_time, archived.delete_time);

    let restored = db.archived_items.restore_by_id(5).await.unwrap().unwrap();
    assert_eq!(restored, original);
    assert_eq!(db.items.find_by_id(5).await.unwrap(), Some(original));
    assert!(db.archived_items.find_by_id(5).await.unwrap().is_none());
}

#[tokio::test]
async fn test_every_kind_round_trips_on_strict_store() {
    init_tracing();
    let (db, store) = strict_memory_database();

    let item = db.items.create(test_fixtures::item("Tripod")).await.unwrap();
    let user = db.users.create(test_fixtures::user("Grace")).await.unwrap();

    assert_round_trip(
        &db.item_types,
        &db.archived_item_types,
        test_fixtures::item_type("Camera"),
    )
    .await;
    assert_round_trip(
        &db.item_groups,
        &db.archived_item_groups,
        test_fixtures::item_group("Studio kit"),
    )
    .await;
    assert_round_trip(
        &db.loans,
        &db.archived_loans,
        test_fixtures::loan(item.id, user.id),
    )
    .await;
    assert_round_trip(
        &db.requests,
        &db.archived_requests,
        test_fixtures::request(user.id, "Need a tripod"),
    )
    .await;
    assert_round_trip(
        &db.items,
        &db.archived_items,
        test_fixtures::item("Light stand"),
    )
    .await;
    assert_round_trip(&db.users, &db.archived_users, test_fixtures::user("Linus")).await;

    for table in test_fixtures::LIVE_TABLES {
        assert!(
            !store.explicit_key_insert_enabled(table).await,
            "explicit key mode left on for {table}"
        );
    }
}

#[tokio::test]
async fn test_restore_keeps_key_after_sequence_moved_on() {
    let (db, _store) = strict_memory_database();
    let first = db.items.create(test_fixtures::item("Laptop")).await.unwrap();
    db.items.archive_by_id(first.id, "stolen").await.unwrap().unwrap();

    let second = db.items.create(test_fixtures::item("Laptop 2")).await.unwrap();
    assert_ne!(second.id, first.id);

    let restored = db.archived_items.restore_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(restored.id, first.id);
    assert_eq!(db.items.get_all().await.unwrap().len(), 2);
}

// =============================================================================
// Status history cascade
// =============================================================================

#[tokio::test]
async fn test_status_history_follows_item_both_ways() {
    init_tracing();
    let (db, store) = strict_memory_database();
    create_items(&db.items, 10).await;

    // History ids 1 and 2 belong to item 1, ids 3 and 4 to item 10.
    for (item_id, status) in [
        (1, ItemStatus::OnLoan),
        (1, ItemStatus::Available),
        (10, ItemStatus::Maintenance),
        (10, ItemStatus::Defective),
    ] {
        db.items
            .record_status(item_id, status, Some("inspection"))
            .await
            .unwrap()
            .unwrap();
    }
    let before = db.items.find_by_id(10).await.unwrap().unwrap();
    let history_ids =
        |rows: &[crate::StatusHistory]| rows.iter().map(|h| h.id).collect::<Vec<_>>();
    assert_eq!(
        history_ids(&db.items.status_history(10).await.unwrap()),
        vec![3, 4]
    );

    db.items.archive_by_id(10, "end of life").await.unwrap().unwrap();
    assert!(db.items.status_history(10).await.unwrap().is_empty());
    let archived_history = db.archived_items.status_history(10).await.unwrap();
    assert_eq!(history_ids(&archived_history), vec![3, 4]);
    assert!(archived_history.iter().all(|h| h.item_id == 10));
    assert_eq!(db.items.status_history(1).await.unwrap().len(), 2);

    let restored = db.archived_items.restore_by_id(10).await.unwrap().unwrap();
    assert_eq!(restored, before);

    let live_history = db.items.status_history(10).await.unwrap();
    assert_eq!(history_ids(&live_history), vec![3, 4]);
    assert!(live_history.iter().all(|h| h.item_id == 10));
    assert_eq!(live_history[1].status, ItemStatus::Defective);
    assert!(db.archived_items.status_history(10).await.unwrap().is_empty());
    assert_eq!(store.row_count("archived_status_history").await, 0);
    assert!(!store.explicit_key_insert_enabled("status_history").await);
}

// =============================================================================
// Not found
// =============================================================================

#[tokio::test]
async fn test_restore_missing_id_returns_none_without_writes() {
    let (db, store) = memory_database();
    let item = db.items.create(test_fixtures::item("Projector")).await.unwrap();
    db.items.record_status(item.id, ItemStatus::OnLoan, None).await.unwrap();
    let before = table_counts(&store).await;

    assert!(db.archived_items.restore_by_id(999).await.unwrap().is_none());
    assert!(db.items.archive_by_id(999, "unused").await.unwrap().is_none());
    assert!(db.archived_items.delete_by_id(999).await.unwrap().is_none());

    assert_eq!(table_counts(&store).await, before);
}

#[tokio::test]
async fn test_restore_of_live_record_is_not_found() {
    let (db, _store) = memory_database();
    let item = db.items.create(test_fixtures::item("Microscope")).await.unwrap();

    assert!(db.archived_items.restore_by_id(item.id).await.unwrap().is_none());
    assert_eq!(db.items.find_by_id(item.id).await.unwrap(), Some(item));
}

// =============================================================================
// User / loan guard
// =============================================================================

#[tokio::test]
async fn test_user_with_live_loan_cannot_be_archived() {
    let (db, store) = strict_memory_database();
    let user = db.users.create(test_fixtures::user("Margaret")).await.unwrap();
    let item = db.items.create(test_fixtures::item("Oscilloscope")).await.unwrap();
    let loan = db.loans.create(test_fixtures::loan(item.id, user.id)).await.unwrap();

    let err = db.users.archive_by_id(user.id, "left").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    assert!(err.to_string().contains("loan"));
    assert_eq!(db.users.find_by_id(user.id).await.unwrap(), Some(user.clone()));
    assert_eq!(store.row_count("archived_app_user").await, 0);
    assert_eq!(store.row_count("archived_loan").await, 0);

    // Loans are never cascaded; once archived themselves the user can go.
    db.loans.archive_by_id(loan.id, "returned").await.unwrap().unwrap();
    let archived = db.users.archive_by_id(user.id, "left").await.unwrap().unwrap();
    assert_eq!(archived.record, user);
    assert!(db.archived_loans.find_by_id(loan.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_loan_of_archived_user_is_not_restored() {
    init_tracing();
    let (db, store) = strict_memory_database();
    let user = db.users.create(test_fixtures::user("Barbara")).await.unwrap();
    let item = db.items.create(test_fixtures::item("Logic analyser")).await.unwrap();
    let loan = db.loans.create(test_fixtures::loan(item.id, user.id)).await.unwrap();
    db.loans.archive_by_id(loan.id, "returned").await.unwrap().unwrap();
    db.users.archive_by_id(user.id, "left").await.unwrap().unwrap();
    let before = table_counts(&store).await;

    let err = db.archived_loans.restore_by_id(loan.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    assert!(err.to_string().contains("app_user"), "{err}");
    assert_eq!(table_counts(&store).await, before);
    assert!(db.loans.find_by_id(loan.id).await.unwrap().is_none());
    assert!(db.archived_loans.find_by_id(loan.id).await.unwrap().is_some());
    assert!(!store.explicit_key_insert_enabled("loan").await);

    // Back in order once the user is live again.
    db.archived_users.restore_by_id(user.id).await.unwrap().unwrap();
    let restored = db.archived_loans.restore_by_id(loan.id).await.unwrap();
    assert_eq!(restored, Some(loan));
}

#[tokio::test]
async fn test_loan_of_archived_user_is_not_restored_without_transactions() {
    let (db, store) = memory_database();
    let user = db.users.create(test_fixtures::user("Dennis")).await.unwrap();
    let item = db.items.create(test_fixtures::item("Teletype")).await.unwrap();
    let loan = db.loans.create(test_fixtures::loan(item.id, user.id)).await.unwrap();
    db.loans.archive_by_id(loan.id, "returned").await.unwrap().unwrap();
    db.users.archive_by_id(user.id, "left").await.unwrap().unwrap();

    // The check runs before any write, so nothing partial is left behind.
    let err = db.archived_loans.restore_by_id(loan.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    assert_eq!(store.row_count("loan").await, 0);
    assert_eq!(store.row_count("archived_loan").await, 1);
}

#[tokio::test]
async fn test_loan_cannot_be_written_for_archived_user() {
    let (db, store) = strict_memory_database();
    let user = db.users.create(test_fixtures::user("Frances")).await.unwrap();
    let other = db.users.create(test_fixtures::user("Jean")).await.unwrap();
    let item = db.items.create(test_fixtures::item("Punch card reader")).await.unwrap();
    let mut loan = db.loans.create(test_fixtures::loan(item.id, other.id)).await.unwrap();
    db.users.archive_by_id(user.id, "left").await.unwrap().unwrap();

    let err = db
        .loans
        .create(test_fixtures::loan(item.id, user.id))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");

    loan.user_id = user.id;
    let err = db.loans.update(&loan).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    assert_eq!(store.row_count("loan").await, 1);
    let stored = db.loans.find_by_id(loan.id).await.unwrap().unwrap();
    assert_eq!(stored.user_id, other.id);
}

// =============================================================================
// Purge
// =============================================================================

#[tokio::test]
async fn test_purge_removes_archived_item_and_history() {
    let (db, store) = strict_memory_database();
    let item = db.items.create(test_fixtures::item("Soldering iron")).await.unwrap();
    db.items.record_status(item.id, ItemStatus::Defective, Some("tip burnt")).await.unwrap();
    db.items.archive_by_id(item.id, "scrapped").await.unwrap().unwrap();

    let purged = db.archived_items.delete_by_id(item.id).await.unwrap().unwrap();
    assert_eq!(purged.record.id, item.id);
    assert_eq!(purged.archive_note, "scrapped");
    assert_eq!(store.row_count("archived_item").await, 0);
    assert_eq!(store.row_count("archived_status_history").await, 0);

    assert!(db.archived_items.delete_by_id(item.id).await.unwrap().is_none());
    assert!(db.archived_items.restore_by_id(item.id).await.unwrap().is_none());
    assert!(db.items.find_by_id(item.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_purge_leaves_live_records_alone() {
    let (db, _store) = memory_database();
    let item = db.items.create(test_fixtures::item("Bench vice")).await.unwrap();

    assert!(db.archived_items.delete_by_id(item.id).await.unwrap().is_none());
    assert_eq!(db.items.find_by_id(item.id).await.unwrap(), Some(item));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_racing_restores_restore_once() {
    let (db, store) = strict_memory_database();
    let item = db.items.create(test_fixtures::item("Spectrometer")).await.unwrap();
    db.items.record_status(item.id, ItemStatus::Maintenance, None).await.unwrap();
    db.items.archive_by_id(item.id, "recalibration").await.unwrap().unwrap();

    let (first, second) = tokio::join!(
        db.archived_items.restore_by_id(item.id),
        db.archived_items.restore_by_id(item.id),
    );
    let outcomes = [first.unwrap(), second.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_some()).count(), 1);

    assert_eq!(store.row_count("item").await, 1);
    assert_eq!(store.row_count("status_history").await, 1);
    assert_eq!(store.row_count("archived_item").await, 0);
}
