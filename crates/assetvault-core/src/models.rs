//! Core data models for assetvault.
//!
//! Every tracked entity has a live shape (the structs in this module) and an
//! archived shape, [`Archived<T>`], which carries the same fields plus the
//! archive note and the time the record was archived. Both shapes share one
//! identifier space: an archived record keeps the key of the live record it
//! was derived from.
//!
//! Fields are never skipped during serialization. Storage backends move
//! records as JSON objects and treat every key as a column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// STATUS ENUMS
// =============================================================================

/// Operational status of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Available,
    OnLoan,
    Maintenance,
    Defective,
    Lost,
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Available => "available",
            Self::OnLoan => "on_loan",
            Self::Maintenance => "maintenance",
            Self::Defective => "defective",
            Self::Lost => "lost",
        };
        f.write_str(s)
    }
}

/// Lifecycle of a borrowing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Denied,
    Fulfilled,
}

/// Role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Staff,
    #[default]
    Borrower,
}

// =============================================================================
// LIVE RECORDS
// =============================================================================

/// Classification of items (e.g. "Laptop", "Projector").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemType {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A set of interchangeable items that can be requested as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemGroup {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub item_type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// A single physical asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub status: ItemStatus,
    pub item_group_id: Option<i64>,
    pub item_type_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One status change of an item. Lives and dies with its item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistory {
    pub id: i64,
    pub item_id: i64,
    pub status: ItemStatus,
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

/// An item handed out to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub loaned_at: DateTime<Utc>,
    pub due_at: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Loan {
    /// Whether the item has not been handed back yet.
    pub fn is_active(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// A user's request to borrow from an item group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: i64,
    pub user_id: i64,
    pub item_group_id: Option<i64>,
    pub message: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// An account that can borrow or administer items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// ARCHIVED RECORDS
// =============================================================================

/// Soft-deleted form of a live record.
///
/// `record.id` is the key the live record had; restoring re-creates the live
/// record under that same key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Archived<T> {
    #[serde(flatten)]
    pub record: T,
    /// Free-text reason given when archiving.
    pub archive_note: String,
    /// When the record was archived.
    pub delete_time: DateTime<Utc>,
}

impl<T> Archived<T> {
    /// Wrap a live record with archive metadata.
    pub fn new(record: T, archive_note: impl Into<String>, delete_time: DateTime<Utc>) -> Self {
        Self {
            record,
            archive_note: archive_note.into(),
            delete_time,
        }
    }

    /// Drop the archive metadata, yielding the live record.
    pub fn into_live(self) -> T {
        self.record
    }
}

/// Archive metadata attached when a live record is archived.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveStamp {
    pub note: String,
    pub at: DateTime<Utc>,
}

impl ArchiveStamp {
    /// Stamp with the current time.
    pub fn now(note: impl Into<String>) -> Self {
        Self {
            note: note.into(),
            at: Utc::now(),
        }
    }
}
