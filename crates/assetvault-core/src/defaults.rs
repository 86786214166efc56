//! Centralized default constants for assetvault.
//!
//! Crates reference these constants instead of defining their own magic
//! numbers. Environment overrides are read by `assetvault_db::config`.

// =============================================================================
// DATABASE
// =============================================================================

/// Database URL used when `DATABASE_URL` is not set.
pub const DATABASE_URL: &str = "postgres://localhost/assetvault";

/// Default maximum number of connections in the pool.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// Default minimum number of idle connections kept in the pool.
pub const DB_MIN_CONNECTIONS: u32 = 1;

/// Default connection acquire timeout in seconds.
pub const DB_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default idle timeout in seconds.
pub const DB_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default maximum connection lifetime in seconds (30 minutes).
pub const DB_MAX_LIFETIME_SECS: u64 = 1800;

// =============================================================================
// ARCHIVE ENGINE
// =============================================================================

/// Lock the source row (`FOR UPDATE`) before moving it.
///
/// Two concurrent restores of one id then serialize: the second observes
/// not-found instead of failing on a duplicate key.
pub const LOCK_SOURCE_ROWS: bool = true;

/// Name of the primary key column on every live and archive table.
pub const KEY_COLUMN: &str = "id";

/// Operations slower than this are logged with `slow = true`.
pub const SLOW_OPERATION_MS: u64 = 500;
