use migo_common::{Error, Result};
use rusqlite::params_from_iter;
use rusqlite::types::{ToSql, ToSqlOutput};

/// A value bound to a statement placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Integer(i64),
    Text(String),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Integer(v) => Ok(ToSqlOutput::from(*v)),
            SqlValue::Text(v) => Ok(ToSqlOutput::from(v.as_str())),
        }
    }
}

/// A database the migrator can drive.
///
/// Placeholders are positional (`?1`, `?2`, ...). Implementations map driver
/// failures to [`Error::Database`].
pub trait Connection {
    type Tx<'c>: Transaction
    where
        Self: 'c;

    /// Execute one statement, returning the number of affected rows.
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize>;

    /// Run a query whose first column of its single row is an integer.
    fn query_count(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64>;

    /// Run a query returning `(integer, text, text)` rows.
    fn query_records(&mut self, sql: &str) -> Result<Vec<(i64, String, String)>>;

    fn begin(&mut self) -> Result<Self::Tx<'_>>;
}

/// An open transaction. Dropping it without `commit` must not persist anything.
pub trait Transaction {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize>;

    /// Execute a script of one or more statements verbatim.
    fn execute_batch(&mut self, sql: &str) -> Result<()>;

    fn commit(self) -> Result<()>;

    fn rollback(self) -> Result<()>;
}

impl Connection for rusqlite::Connection {
    type Tx<'c> = rusqlite::Transaction<'c>;

    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        rusqlite::Connection::execute(self, sql, params_from_iter(params.iter()))
            .map_err(|e| Error::Database(format!("failed to execute statement: {e}")))
    }

    fn query_count(&mut self, sql: &str, params: &[SqlValue]) -> Result<i64> {
        self.query_row(sql, params_from_iter(params.iter()), |row| row.get(0))
            .map_err(|e| Error::Database(format!("failed to run query: {e}")))
    }

    fn query_records(&mut self, sql: &str) -> Result<Vec<(i64, String, String)>> {
        let mut stmt = self
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| Error::Database(format!("failed to run query: {e}")))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|e| Error::Database(format!("failed to read row: {e}")))?);
        }
        Ok(records)
    }

    fn begin(&mut self) -> Result<rusqlite::Transaction<'_>> {
        self.transaction()
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))
    }
}

impl Transaction for rusqlite::Transaction<'_> {
    fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<usize> {
        rusqlite::Connection::execute(self, sql, params_from_iter(params.iter()))
            .map_err(|e| Error::Database(format!("failed to execute statement: {e}")))
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        rusqlite::Connection::execute_batch(self, sql)
            .map_err(|e| Error::Database(format!("failed to execute script: {e}")))
    }

    fn commit(self) -> Result<()> {
        rusqlite::Transaction::commit(self)
            .map_err(|e| Error::Database(format!("failed to commit transaction: {e}")))
    }

    fn rollback(self) -> Result<()> {
        rusqlite::Transaction::rollback(self)
            .map_err(|e| Error::Database(format!("failed to roll back transaction: {e}")))
    }
}
