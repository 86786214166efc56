//! Entity kind declarations for the archive/restore engine.
//!
//! Each tracked kind declares where its live and archived rows are stored,
//! which child tables move with it, which live references block it from
//! being archived, and which live rows it must point at to be restored. The
//! engine is driven entirely by these declarations.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::defaults::KEY_COLUMN;
use crate::error::Result;
use crate::mapper::{same_shape, Record};
use crate::models::{Item, ItemGroup, ItemType, Loan, Request, StatusHistory, User};

/// Row mapper used when moving a dependent between storage areas.
pub type RecordMapper = fn(Record) -> Result<Record>;

/// A child table whose rows must live where their parent lives.
#[derive(Debug, Clone, Copy)]
pub struct Dependent {
    /// Name used in logs.
    pub name: &'static str,
    pub live_table: &'static str,
    pub archive_table: &'static str,
    /// Primary key column of the child table.
    pub key: &'static str,
    /// Column on the child that holds the parent's key.
    pub foreign_key: &'static str,
    pub to_archived: RecordMapper,
    pub to_live: RecordMapper,
}

/// Live rows in `table` whose `column` equals the parent key block archiving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveGuard {
    pub table: &'static str,
    pub column: &'static str,
}

/// `column` on the record must hold the key of a live row in `table`.
///
/// Checked before a record is restored or written on the live side. With
/// row locking on, the referenced row stays locked for the rest of the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveReference {
    pub column: &'static str,
    pub table: &'static str,
    pub key: &'static str,
}

/// A kind of record that can be archived and restored.
pub trait EntityKind:
    Serialize + DeserializeOwned + Clone + Send + Sync + std::fmt::Debug + 'static
{
    /// Name used in logs and error messages.
    const NAME: &'static str;
    const LIVE_TABLE: &'static str;
    const ARCHIVE_TABLE: &'static str;
    const KEY: &'static str = KEY_COLUMN;
    const DEPENDENTS: &'static [Dependent] = &[];
    const GUARDS: &'static [ArchiveGuard] = &[];
    const REFERENCES: &'static [LiveReference] = &[];

    /// Primary key of this record.
    fn id(&self) -> i64;
}

/// StatusHistory rows follow their item.
pub const ITEM_STATUS_HISTORY: Dependent = Dependent {
    name: "status_history",
    live_table: "status_history",
    archive_table: "archived_status_history",
    key: KEY_COLUMN,
    foreign_key: "item_id",
    to_archived: same_shape::<StatusHistory>,
    to_live: same_shape::<StatusHistory>,
};

/// A user with live loans is never archived; loans are not cascaded.
///
/// Every live loan row counts, returned or not: a live loan must never point
/// at an archived user, so returned loans have to be archived first. The
/// count takes no locks on `loan`. With row locking on, loan writes lock
/// their user through [`LOAN_USER`] and the archive holds that row
/// `FOR UPDATE`, so a concurrent loan write either commits before the count
/// or finds the user gone.
pub const USER_LOANS: ArchiveGuard = ArchiveGuard {
    table: "loan",
    column: "user_id",
};

/// A loan belongs to a live user.
pub const LOAN_USER: LiveReference = LiveReference {
    column: "user_id",
    table: "app_user",
    key: KEY_COLUMN,
};

impl EntityKind for Item {
    const NAME: &'static str = "item";
    const LIVE_TABLE: &'static str = "item";
    const ARCHIVE_TABLE: &'static str = "archived_item";
    const DEPENDENTS: &'static [Dependent] = &[ITEM_STATUS_HISTORY];

    fn id(&self) -> i64 {
        self.id
    }
}

impl EntityKind for ItemGroup {
    const NAME: &'static str = "item_group";
    const LIVE_TABLE: &'static str = "item_group";
    const ARCHIVE_TABLE: &'static str = "archived_item_group";

    fn id(&self) -> i64 {
        self.id
    }
}

impl EntityKind for ItemType {
    const NAME: &'static str = "item_type";
    const LIVE_TABLE: &'static str = "item_type";
    const ARCHIVE_TABLE: &'static str = "archived_item_type";

    fn id(&self) -> i64 {
        self.id
    }
}

impl EntityKind for Loan {
    const NAME: &'static str = "loan";
    const LIVE_TABLE: &'static str = "loan";
    const ARCHIVE_TABLE: &'static str = "archived_loan";
    const REFERENCES: &'static [LiveReference] = &[LOAN_USER];

    fn id(&self) -> i64 {
        self.id
    }
}

impl EntityKind for Request {
    const NAME: &'static str = "request";
    const LIVE_TABLE: &'static str = "item_request";
    const ARCHIVE_TABLE: &'static str = "archived_item_request";

    fn id(&self) -> i64 {
        self.id
    }
}

impl EntityKind for User {
    const NAME: &'static str = "user";
    const LIVE_TABLE: &'static str = "app_user";
    const ARCHIVE_TABLE: &'static str = "archived_app_user";
    const GUARDS: &'static [ArchiveGuard] = &[USER_LOANS];

    fn id(&self) -> i64 {
        self.id
    }
}
