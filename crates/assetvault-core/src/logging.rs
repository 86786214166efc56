//! Structured logging schema and field name constants for assetvault.
//!
//! All crates use these names for structured logging fields so log
//! aggregation can query archive and restore activity uniformly.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Explicit-key mode could not be released, rollback failed |
//! | WARN  | Rolled back, or ran without a transaction |
//! | INFO  | Completed archive, restore and purge operations |
//! | DEBUG | Decision points (capabilities, toggles, not-found) |
//! | TRACE | Per-row work (dependent inserts) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "engine"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "archive_engine", "pg_store", "memory_store", "pool", "writer"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "archive", "restore", "purge", "create"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Entity kind being moved (`item`, `loan`, ...).
pub const ENTITY_KIND: &str = "entity_kind";

/// Primary key of the record being moved.
pub const ENTITY_ID: &str = "entity_id";

/// Database table affected.
pub const DB_TABLE: &str = "db_table";

/// Number of dependent rows migrated alongside a parent.
pub const DEPENDENT_COUNT: &str = "dependent_count";

// ─── Storage fields ────────────────────────────────────────────────────────

/// Whether the operation ran inside a transaction.
pub const TRANSACTIONAL: &str = "transactional";

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
