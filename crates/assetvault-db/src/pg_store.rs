//! PostgreSQL storage backend.
//!
//! Rows travel as JSON: reads use `to_jsonb(t)` and writes project a bound
//! JSONB object onto the table's row type with `jsonb_populate_record`, so
//! one code path serves every table.
//!
//! Live tables use `GENERATED ALWAYS AS IDENTITY` keys. Explicit-key insert
//! mode is session state: while it is on for a table, inserts into that table
//! carry `OVERRIDING SYSTEM VALUE`. The table definition is never altered, so
//! a restore needs only `INSERT` privilege and takes no lock beyond the row
//! locks of the insert itself. Every other session keeps `GENERATED ALWAYS`.
//!
//! Opening a session waits for a pooled connection; when that wait is slow
//! the pool's health is logged.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, trace};

use assetvault_core::defaults::SLOW_OPERATION_MS;
use assetvault_core::{record_i64, Error, Record, Result};

use crate::identifiers::{quote_columns, quote_identifier};
use crate::pool::log_pool_health;
use crate::store::{Store, StoreCapabilities, StoreSession};

const PG_CAPABILITIES: StoreCapabilities = StoreCapabilities::new(true, true);

/// PostgreSQL implementation of [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new PgStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    fn capabilities(&self) -> StoreCapabilities {
        PG_CAPABILITIES
    }

    async fn session(&self) -> Result<Box<dyn StoreSession>> {
        let start = Instant::now();
        let tx = self.pool.begin().await.map_err(Error::Database)?;
        let wait_ms = start.elapsed().as_millis() as u64;
        if wait_ms > SLOW_OPERATION_MS {
            log_pool_health(&self.pool, wait_ms);
        }
        Ok(Box::new(PgSession {
            tx,
            explicit_keys: HashSet::new(),
        }))
    }
}

/// A transaction on a [`PgStore`].
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
    /// Tables currently in explicit-key insert mode.
    explicit_keys: HashSet<String>,
}

fn into_record(value: JsonValue) -> Result<Record> {
    match value {
        JsonValue::Object(map) => Ok(map),
        _ => Err(Error::Internal(
            "to_jsonb returned a non-object row".to_string(),
        )),
    }
}

/// Columns of `record`, optionally without the key column.
fn record_columns<'a>(record: &'a Record, skip: Option<&str>) -> Vec<&'a str> {
    record
        .keys()
        .map(String::as_str)
        .filter(|column| Some(*column) != skip)
        .collect()
}

/// `INSERT .. SELECT` of one bound JSONB row. `explicit_key` lets the row's own
/// key override a `GENERATED ALWAYS` identity.
fn insert_statement(table_sql: &str, columns: &str, explicit_key: bool) -> String {
    let overriding = if explicit_key {
        " OVERRIDING SYSTEM VALUE"
    } else {
        ""
    };
    format!(
        "INSERT INTO {table_sql} ({columns}){overriding} \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table_sql}, $1)"
    )
}

#[async_trait]
impl StoreSession for PgSession {
    fn capabilities(&self) -> StoreCapabilities {
        PG_CAPABILITIES
    }

    async fn fetch_by_key(
        &mut self,
        table: &str,
        key: &str,
        id: i64,
        lock: bool,
    ) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.{} = $1{}",
            quote_identifier(table)?,
            quote_identifier(key)?,
            if lock { " FOR UPDATE" } else { "" }
        );
        let row: Option<JsonValue> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        row.map(into_record).transpose()
    }

    async fn fetch_by_column(
        &mut self,
        table: &str,
        key: &str,
        column: &str,
        value: i64,
    ) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t WHERE t.{} = $1 ORDER BY t.{}",
            quote_identifier(table)?,
            quote_identifier(column)?,
            quote_identifier(key)?
        );
        let rows: Vec<JsonValue> = sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        rows.into_iter().map(into_record).collect()
    }

    async fn fetch_all(&mut self, table: &str, key: &str) -> Result<Vec<Record>> {
        let sql = format!(
            "SELECT to_jsonb(t) FROM {} t ORDER BY t.{}",
            quote_identifier(table)?,
            quote_identifier(key)?
        );
        let rows: Vec<JsonValue> = sqlx::query_scalar(&sql)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        rows.into_iter().map(into_record).collect()
    }

    async fn count_by_column(&mut self, table: &str, column: &str, value: i64) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} = $1",
            quote_identifier(table)?,
            quote_identifier(column)?
        );
        sqlx::query_scalar(&sql)
            .bind(value)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(Error::Database)
    }

    async fn insert(&mut self, table: &str, key: &str, record: &Record) -> Result<()> {
        record_i64(record, key)?;
        let table_sql = quote_identifier(table)?;
        let columns = quote_columns(record_columns(record, None))?;
        let explicit_key = self.explicit_keys.contains(table);
        let sql = insert_statement(&table_sql, &columns, explicit_key);
        trace!(
            subsystem = "db",
            component = "pg_store",
            op = "insert",
            db_table = table,
            explicit_key,
            "Inserting row with explicit key"
        );
        sqlx::query(&sql)
            .bind(Json(record))
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }

    async fn insert_generated(&mut self, table: &str, key: &str, record: &Record) -> Result<i64> {
        let table_sql = quote_identifier(table)?;
        let key_sql = quote_identifier(key)?;
        let columns = quote_columns(record_columns(record, Some(key)))?;
        let sql = format!(
            "INSERT INTO {table_sql} ({columns}) \
             SELECT {columns} FROM jsonb_populate_record(NULL::{table_sql}, $1) \
             RETURNING {key_sql}"
        );
        sqlx::query_scalar(&sql)
            .bind(Json(record))
            .fetch_one(&mut *self.tx)
            .await
            .map_err(Error::Database)
    }

    async fn update(&mut self, table: &str, key: &str, record: &Record) -> Result<bool> {
        let id = record_i64(record, key)?;
        let table_sql = quote_identifier(table)?;
        let key_sql = quote_identifier(key)?;
        let assignments = record_columns(record, Some(key))
            .into_iter()
            .map(|column| {
                let column = quote_identifier(column)?;
                Ok(format!("{column} = r.{column}"))
            })
            .collect::<Result<Vec<_>>>()?;
        if assignments.is_empty() {
            return Err(Error::InvalidInput(format!(
                "update of {table} has no columns besides the key"
            )));
        }
        let sql = format!(
            "UPDATE {table_sql} AS t SET {} \
             FROM jsonb_populate_record(NULL::{table_sql}, $1) AS r \
             WHERE t.{key_sql} = $2",
            assignments.join(", ")
        );
        let result = sqlx::query(&sql)
            .bind(Json(record))
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_key(&mut self, table: &str, key: &str, id: i64) -> Result<u64> {
        self.delete_by_column(table, key, id).await
    }

    async fn delete_by_column(&mut self, table: &str, column: &str, value: i64) -> Result<u64> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = $1",
            quote_identifier(table)?,
            quote_identifier(column)?
        );
        let result = sqlx::query(&sql)
            .bind(value)
            .execute(&mut *self.tx)
            .await
            .map_err(Error::Database)?;
        Ok(result.rows_affected())
    }

    async fn set_explicit_key_insert(
        &mut self,
        table: &str,
        key: &str,
        enabled: bool,
    ) -> Result<()> {
        quote_identifier(table)?;
        quote_identifier(key)?;
        debug!(
            subsystem = "db",
            component = "pg_store",
            op = "identity_toggle",
            db_table = table,
            enabled,
            "Switching explicit key insert mode"
        );
        if enabled {
            self.explicit_keys.insert(table.to_string());
        } else {
            self.explicit_keys.remove(table);
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(Error::Database)
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await.map_err(Error::Database)
    }
}
