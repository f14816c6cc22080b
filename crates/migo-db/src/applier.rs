use migo_common::{Error, Result};
use tracing::debug;

use crate::connection::{Connection, Transaction};
use crate::filename::MigrationFile;
use crate::metadata::{MetadataStore, timestamp_now};
use crate::source::{MigrationSource, migration_path};

/// What happened to a single migration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    /// Nothing of the migration persisted.
    Failed(String),
    /// The existence check failed; retried on a later run.
    Deferred(String),
}

impl Outcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied)
    }
}

/// Apply one migration in its own transaction.
///
/// The metadata record is inserted before the script runs, and both commit or
/// roll back together. Per-file failures come back as [`Outcome::Failed`];
/// the only `Err` is [`Error::Unrecoverable`], returned when a failed
/// migration could not be rolled back.
pub fn apply_migration<C, S>(
    conn: &mut C,
    source: &S,
    store: &MetadataStore,
    file: &MigrationFile,
) -> Result<Outcome>
where
    C: Connection,
    S: MigrationSource + ?Sized,
{
    let mut tx = match conn.begin() {
        Ok(tx) => tx,
        Err(e) => return Ok(Outcome::Failed(e.to_string())),
    };

    let body = match source.read_to_string(&migration_path(&file.file_name)) {
        Ok(body) => body,
        Err(e) => return roll_back(tx, file, format!("could not read script: {e}")),
    };

    if let Err(e) = store.insert_record(&mut tx, file.id, &file.display_name, &timestamp_now()) {
        return roll_back(tx, file, format!("could not add metadata entry: {e}"));
    }

    debug!("executing {}", file.file_name);
    if let Err(e) = tx.execute_batch(&body) {
        return roll_back(tx, file, e.to_string());
    }

    match tx.commit() {
        Ok(()) => Ok(Outcome::Applied),
        Err(e) => Ok(Outcome::Failed(e.to_string())),
    }
}

fn roll_back<T: Transaction>(tx: T, file: &MigrationFile, reason: String) -> Result<Outcome> {
    tx.rollback().map_err(|e| {
        Error::Unrecoverable(format!(
            "unable to roll back failed migration {} ({reason}): {e}",
            file.file_name
        ))
    })?;
    Ok(Outcome::Failed(reason))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn setup() -> (rusqlite::Connection, MetadataStore) {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = MetadataStore::default();
        store.ensure_table(&mut conn).unwrap();
        (conn, store)
    }

    fn table_count(conn: &mut rusqlite::Connection, table: &str) -> i64 {
        conn.query_count(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            &[table.into()],
        )
        .unwrap()
    }

    #[test]
    fn applies_script_and_records_it() {
        let (mut conn, store) = setup();
        let source = MemorySource::new().with_migration(
            "1_users.sql",
            "CREATE TABLE users (id INTEGER); INSERT INTO users VALUES (1);",
        );
        let file = MigrationFile::forward("1_users.sql").unwrap();

        let outcome = apply_migration(&mut conn, &source, &store, &file).unwrap();
        assert_eq!(outcome, Outcome::Applied);
        assert!(store.has_record(&mut conn, 1).unwrap());
        assert_eq!(table_count(&mut conn, "users"), 1);
    }

    #[test]
    fn failing_script_leaves_no_trace() {
        let (mut conn, store) = setup();
        let source = MemorySource::new().with_migration(
            "2_bad.sql",
            "CREATE TABLE half (id INTEGER); THIS IS NOT SQL;",
        );
        let file = MigrationFile::forward("2_bad.sql").unwrap();

        let outcome = apply_migration(&mut conn, &source, &store, &file).unwrap();
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert!(!store.has_record(&mut conn, 2).unwrap());
        assert_eq!(table_count(&mut conn, "half"), 0);
    }

    #[test]
    fn missing_script_body_fails_without_record() {
        let (mut conn, store) = setup();
        let source = MemorySource::new().with_migration("1_a.sql", "");
        let file = MigrationFile::forward("3_gone.sql").unwrap();

        let outcome = apply_migration(&mut conn, &source, &store, &file).unwrap();
        match outcome {
            Outcome::Failed(reason) => assert!(reason.contains("could not read script")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!store.has_record(&mut conn, 3).unwrap());
    }

    #[test]
    fn duplicate_id_rolls_back_before_script_runs() {
        let (mut conn, store) = setup();
        let source = MemorySource::new()
            .with_migration("5_x.sql", "CREATE TABLE x (id INTEGER);")
            .with_migration("5_y.sql", "CREATE TABLE y (id INTEGER);");

        let x = MigrationFile::forward("5_x.sql").unwrap();
        let y = MigrationFile::forward("5_y.sql").unwrap();
        assert!(apply_migration(&mut conn, &source, &store, &x).unwrap().is_applied());

        let outcome = apply_migration(&mut conn, &source, &store, &y).unwrap();
        assert!(matches!(outcome, Outcome::Failed(_)));
        assert_eq!(table_count(&mut conn, "y"), 0);
        assert_eq!(store.records(&mut conn).unwrap().len(), 1);
    }
}
