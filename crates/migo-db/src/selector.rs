use migo_common::{Error, Result};
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::filename::MigrationFile;
use crate::metadata::MetadataStore;
use crate::source::{MIGRATIONS_DIR, MigrationSource};

/// Outcome of comparing the migrations directory against the metadata table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Forward migrations with no record, in application order.
    pub pending: Vec<MigrationFile>,
    /// Forward migrations whose record could not be checked this run.
    pub deferred: Vec<(MigrationFile, String)>,
}

/// Forward migrations in the migrations directory, ascending by id.
///
/// Ties on id keep filename order. Entries that are not regular files or do
/// not parse as forward migrations are skipped.
pub fn forward_migrations<S: MigrationSource + ?Sized>(source: &S) -> Result<Vec<MigrationFile>> {
    let entries = source
        .read_dir(MIGRATIONS_DIR)
        .map_err(|e| Error::Listing(format!("could not read {MIGRATIONS_DIR}: {e}")))?;

    let mut files: Vec<MigrationFile> = entries
        .into_iter()
        .filter(|entry| entry.is_file())
        .filter_map(|entry| {
            let file = MigrationFile::forward(&entry.name);
            if file.is_none() {
                debug!("skipping {}: not a forward migration", entry.name);
            }
            file
        })
        .collect();

    files.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.file_name.cmp(&b.file_name)));
    Ok(files)
}

/// Rollback scripts in the migrations directory. Listed, never executed.
pub fn rollback_files<S: MigrationSource + ?Sized>(source: &S) -> Result<Vec<MigrationFile>> {
    let entries = source
        .read_dir(MIGRATIONS_DIR)
        .map_err(|e| Error::Listing(format!("could not read {MIGRATIONS_DIR}: {e}")))?;

    let mut files: Vec<MigrationFile> = entries
        .into_iter()
        .filter(|entry| entry.is_file())
        .filter_map(|entry| MigrationFile::parse(&entry.name).ok())
        .filter(|file| file.is_rollback)
        .collect();

    files.sort_by(|a, b| a.id.cmp(&b.id).then_with(|| a.file_name.cmp(&b.file_name)));
    Ok(files)
}

/// Forward migrations that still need to run.
///
/// A failed existence check defers that file to a later run rather than
/// treating it as pending.
pub fn pending_migrations<C, S>(conn: &mut C, source: &S, store: &MetadataStore) -> Result<Selection>
where
    C: Connection,
    S: MigrationSource + ?Sized,
{
    let mut selection = Selection::default();

    for file in forward_migrations(source)? {
        match store.has_record(conn, file.id) {
            Ok(true) => debug!("{} already applied", file.file_name),
            Ok(false) => selection.pending.push(file),
            Err(e) => {
                warn!("deferring {}: {e}", file.file_name);
                selection.deferred.push((file, e.to_string()));
            }
        }
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Transaction;
    use crate::source::MemorySource;

    fn names(files: &[MigrationFile]) -> Vec<&str> {
        files.iter().map(|f| f.file_name.as_str()).collect()
    }

    #[test]
    fn keeps_only_forward_migrations_in_id_order() {
        let mut source = MemorySource::new()
            .with_migration("3_c.sql", "")
            .with_migration("1_a.sql", "")
            .with_migration("10_j.sql", "")
            .with_migration("2_b.sql", "")
            .with_migration("2_b_rollback.sql", "")
            .with_migration("notes.txt", "")
            .with_migration("init.sql", "");
        source.insert("migrations/4_dir/5_inner.sql", "");

        let files = forward_migrations(&source).unwrap();
        assert_eq!(names(&files), vec!["1_a.sql", "2_b.sql", "3_c.sql", "10_j.sql"]);
    }

    #[test]
    fn duplicate_ids_keep_filename_order() {
        let source = MemorySource::new()
            .with_migration("5_y.sql", "")
            .with_migration("5_x.sql", "");
        let files = forward_migrations(&source).unwrap();
        assert_eq!(names(&files), vec!["5_x.sql", "5_y.sql"]);
    }

    #[test]
    fn rollback_files_are_listed_separately() {
        let source = MemorySource::new()
            .with_migration("1_a.sql", "")
            .with_migration("1_a_rollback.sql", "")
            .with_migration("x_rollback.sql", "");
        let files = rollback_files(&source).unwrap();
        assert_eq!(names(&files), vec!["1_a_rollback.sql"]);
    }

    #[test]
    fn missing_directory_is_a_listing_error() {
        let source = MemorySource::new();
        let err = forward_migrations(&source).unwrap_err();
        assert!(matches!(err, Error::Listing(_)));
    }

    #[test]
    fn applied_migrations_are_not_pending() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = MetadataStore::default();
        store.ensure_table(&mut conn).unwrap();

        let mut tx = conn.begin().unwrap();
        store.insert_record(&mut tx, 1, "1_a.sql", "t").unwrap();
        Transaction::commit(tx).unwrap();

        let source = MemorySource::new()
            .with_migration("1_a.sql", "")
            .with_migration("2_b.sql", "");
        let selection = pending_migrations(&mut conn, &source, &store).unwrap();
        assert_eq!(names(&selection.pending), vec!["2_b.sql"]);
        assert!(selection.deferred.is_empty());
    }

    #[test]
    fn failed_checks_defer_instead_of_pending() {
        // No metadata table, so every existence check fails.
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        let store = MetadataStore::default();
        let source = MemorySource::new().with_migration("1_a.sql", "");

        let selection = pending_migrations(&mut conn, &source, &store).unwrap();
        assert!(selection.pending.is_empty());
        assert_eq!(selection.deferred.len(), 1);
        assert_eq!(selection.deferred[0].0.file_name, "1_a.sql");
    }
}
