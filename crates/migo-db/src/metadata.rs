use chrono::{SecondsFormat, Utc};
use migo_common::{Error, Result};
use tracing::debug;

use crate::connection::{Connection, SqlValue, Transaction};
use crate::filename::{NAME_LIMIT, truncate_name};

/// Name of the bookkeeping table used when no other is configured.
pub const DEFAULT_TABLE: &str = "migo_metadata";

/// Persistent record of which migrations have been applied.
///
/// The table name is fixed at construction from a `'static` string, so it is
/// always a compile-time constant of the caller. Only ids, names and
/// timestamps are passed to the database, and always as bound parameters.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    table: &'static str,
    name_limit: usize,
    create_sql: String,
    drop_sql: String,
    count_sql: String,
    insert_sql: String,
    exists_sql: String,
    select_sql: String,
}

/// A row of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationRecord {
    pub id: i64,
    pub name: String,
    pub migrated_at: String,
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE)
    }
}

impl MetadataStore {
    pub fn new(table: &'static str) -> Self {
        Self::with_name_limit(table, NAME_LIMIT)
    }

    pub fn with_name_limit(table: &'static str, name_limit: usize) -> Self {
        Self {
            table,
            name_limit,
            create_sql: format!(
                "CREATE TABLE IF NOT EXISTS {table} (id INTEGER PRIMARY KEY, name VARCHAR({name_limit}) UNIQUE, migrated_at VARCHAR(30))"
            ),
            drop_sql: format!("DROP TABLE IF EXISTS {table}"),
            count_sql: format!("SELECT COUNT(id) FROM {table} WHERE id = ?1"),
            insert_sql: format!("INSERT INTO {table} (id, name, migrated_at) VALUES (?1, ?2, ?3)"),
            exists_sql: format!(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '{table}'"
            ),
            select_sql: format!("SELECT id, name, migrated_at FROM {table} ORDER BY id ASC"),
        }
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn name_limit(&self) -> usize {
        self.name_limit
    }

    /// Create the table if it is absent. Safe to call on every run.
    pub fn ensure_table<C: Connection>(&self, conn: &mut C) -> Result<()> {
        conn.execute(&self.create_sql, &[])
            .map_err(|e| Error::Metadata(format!("could not create or check for {}: {e}", self.table)))?;
        Ok(())
    }

    /// Drop the table and every record in it. Applied schema changes stay.
    pub fn drop_table<C: Connection>(&self, conn: &mut C) -> Result<()> {
        conn.execute(&self.drop_sql, &[])
            .map_err(|e| Error::Metadata(format!("could not drop {}: {e}", self.table)))?;
        Ok(())
    }

    /// Whether a record with `id` exists. Errors are returned, never read as "absent".
    pub fn has_record<C: Connection>(&self, conn: &mut C, id: i64) -> Result<bool> {
        let hits = conn
            .query_count(&self.count_sql, &[SqlValue::Integer(id)])
            .map_err(|e| Error::Metadata(format!("could not check migration {id}: {e}")))?;
        Ok(hits >= 1)
    }

    /// Insert a record inside the caller's transaction so it commits or rolls
    /// back together with the migration body.
    pub fn insert_record<T: Transaction>(
        &self,
        tx: &mut T,
        id: i64,
        name: &str,
        migrated_at: &str,
    ) -> Result<()> {
        let name = truncate_name(name, self.name_limit);
        debug!("recording migration {id} as {name}");
        tx.execute(
            &self.insert_sql,
            &[
                SqlValue::Integer(id),
                SqlValue::Text(name),
                SqlValue::Text(migrated_at.to_string()),
            ],
        )?;
        Ok(())
    }

    /// Whether the table currently exists. Only meaningful on SQLite.
    pub fn table_exists<C: Connection>(&self, conn: &mut C) -> Result<bool> {
        let count = conn
            .query_count(&self.exists_sql, &[])
            .map_err(|e| Error::Metadata(format!("could not look up {}: {e}", self.table)))?;
        Ok(count > 0)
    }

    /// All applied records, ascending by id. An absent table yields no records.
    pub fn records<C: Connection>(&self, conn: &mut C) -> Result<Vec<MigrationRecord>> {
        if !self.table_exists(conn)? {
            return Ok(Vec::new());
        }

        let rows = conn
            .query_records(&self.select_sql)
            .map_err(|e| Error::Metadata(format!("could not read {}: {e}", self.table)))?;

        Ok(rows
            .into_iter()
            .map(|(id, name, migrated_at)| MigrationRecord {
                id,
                name,
                migrated_at,
            })
            .collect())
    }
}

/// Current time as an RFC 3339 string, the format stored in `migrated_at`.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
