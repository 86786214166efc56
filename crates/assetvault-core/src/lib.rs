//! # assetvault-core
//!
//! Core types, traits, and entity declarations for the assetvault asset
//! tracker.
//!
//! This crate provides the live and archived record shapes, the per-kind
//! declarations that drive the archive/restore engine in `assetvault-db`,
//! and the repository traits callers program against.

pub mod defaults;
pub mod error;
pub mod kinds;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use kinds::{ArchiveGuard, Dependent, EntityKind, LiveReference, RecordMapper};
pub use mapper::{archive_record, from_record, record_i64, restore_record, to_record, Record};
pub use models::*;
pub use traits::*;
