//! Archive/restore against PostgreSQL.
//!
//! Exercises explicit-key restores, row locking and transactional
//! rollback on a real server. Each test works in its own schema.

use assetvault_db::test_fixtures::{self, TestDatabase};
use assetvault_db::{ArchiveRepository, Error, ItemStatus, LiveRepository, Store};

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_capabilities() {
    let test_db = TestDatabase::new().await;
    let capabilities = test_db.db.store().capabilities();
    assert!(capabilities.supports_transactions());
    assert!(capabilities.enforces_generated_keys());
    test_db.cleanup().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_item_round_trip_with_history() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let item = db.items.create(test_fixtures::item("Bandsaw")).await?;
    db.items
        .record_status(item.id, ItemStatus::Maintenance, Some("blade change"))
        .await?;
    db.items
        .record_status(item.id, ItemStatus::Available, None)
        .await?;
    let item = db.items.find_by_id(item.id).await?.expect("item");
    let history_ids: Vec<i64> = db
        .items
        .status_history(item.id)
        .await?
        .iter()
        .map(|h| h.id)
        .collect();

    let archived = db
        .items
        .archive_by_id(item.id, "broken screen")
        .await?
        .expect("archived");
    assert_eq!(archived.archive_note, "broken screen");
    assert!(db.items.find_by_id(item.id).await?.is_none());
    assert_eq!(db.archived_items.status_history(item.id).await?.len(), 2);

    // The identity sequence moves on while the item is archived.
    let other = db.items.create(test_fixtures::item("Lathe")).await?;
    assert_ne!(other.id, item.id);

    let restored = db
        .archived_items
        .restore_by_id(item.id)
        .await?
        .expect("restored");
    assert_eq!(restored, item);
    let restored_history: Vec<i64> = db
        .items
        .status_history(item.id)
        .await?
        .iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(restored_history, history_ids);
    assert!(db.archived_items.find_by_id(item.id).await?.is_none());

    // The identity column still rejects explicit keys after the restore.
    let mut explicit = test_fixtures::item("Explicit");
    explicit.id = 9_000;
    let err = sqlx::query(
        "INSERT INTO item (id, name, status, created_at, updated_at) \
         VALUES ($1, $2, 'available', now(), now())",
    )
    .bind(explicit.id)
    .bind(&explicit.name)
    .execute(&test_db.pool)
    .await;
    assert!(err.is_err(), "explicit key accepted after restore");

    test_db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_restore_missing_is_none() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await;
    assert!(test_db.db.archived_items.restore_by_id(999).await?.is_none());
    assert!(test_db.db.archived_users.delete_by_id(999).await?.is_none());
    test_db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_occupied_key_rolls_back_restore() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let item = db.items.create(test_fixtures::item("Kiln")).await?;
    db.items.archive_by_id(item.id, "cracked").await?;

    sqlx::query(
        "INSERT INTO item (id, name, status, created_at, updated_at) \
         OVERRIDING SYSTEM VALUE VALUES ($1, 'Squatter', 'available', now(), now())",
    )
    .bind(item.id)
    .execute(&test_db.pool)
    .await?;

    let err = db.archived_items.restore_by_id(item.id).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)), "got {err:?}");
    assert!(db.archived_items.find_by_id(item.id).await?.is_some());

    test_db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_user_with_loan_is_blocked() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let user = db.users.create(test_fixtures::user("Edsger")).await?;
    let item = db.items.create(test_fixtures::item("Plotter")).await?;
    db.loans.create(test_fixtures::loan(item.id, user.id)).await?;

    let err = db.users.archive_by_id(user.id, "left").await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    assert!(db.users.find_by_id(user.id).await?.is_some());

    test_db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_loan_of_archived_user_is_not_restored() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let user = db.users.create(test_fixtures::user("Tony")).await?;
    let item = db.items.create(test_fixtures::item("Oscilloscope")).await?;
    let loan = db.loans.create(test_fixtures::loan(item.id, user.id)).await?;
    db.loans.archive_by_id(loan.id, "returned").await?;
    db.users.archive_by_id(user.id, "left").await?;

    let err = db.archived_loans.restore_by_id(loan.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
    assert!(db.loans.find_by_id(loan.id).await?.is_none());
    assert!(db.archived_loans.find_by_id(loan.id).await?.is_some());

    test_db.cleanup().await;
    Ok(())
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with a reachable PostgreSQL server
async fn test_pg_racing_restores_restore_once() -> anyhow::Result<()> {
    let test_db = TestDatabase::new().await;
    let db = &test_db.db;

    let group = db
        .item_groups
        .create(test_fixtures::item_group("Field kit"))
        .await?;
    db.item_groups.archive_by_id(group.id, "season over").await?;

    let (first, second) = tokio::join!(
        db.archived_item_groups.restore_by_id(group.id),
        db.archived_item_groups.restore_by_id(group.id),
    );
    let restored = [first?, second?].into_iter().flatten().count();
    assert_eq!(restored, 1);
    assert_eq!(db.item_groups.find_by_id(group.id).await?, Some(group));

    test_db.cleanup().await;
    Ok(())
}
