use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Directory, relative to a source root, that holds migration scripts.
pub const MIGRATIONS_DIR: &str = "migrations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl SourceEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::File,
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Hierarchical, read-only view of migration scripts.
///
/// Paths are `/`-separated and relative to the source root.
pub trait MigrationSource {
    /// List `dir`, sorted by entry name. Entries that cannot be inspected are
    /// left out; failing to open `dir` itself is an error.
    fn read_dir(&self, dir: &str) -> io::Result<Vec<SourceEntry>>;

    fn read_to_string(&self, path: &str) -> io::Result<String>;
}

/// Path of a script inside the migrations directory.
pub fn migration_path(file_name: &str) -> String {
    format!("{MIGRATIONS_DIR}/{file_name}")
}

/// Migration scripts read from the filesystem.
#[derive(Debug, Clone)]
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    /// `root` is the directory containing `migrations/`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl MigrationSource for DirSource {
    fn read_dir(&self, dir: &str) -> io::Result<Vec<SourceEntry>> {
        let dir_path = self.resolve(dir);
        let mut entries = Vec::new();

        for entry in std::fs::read_dir(&dir_path)? {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    debug!("skipping unreadable entry in {}: {e}", dir_path.display());
                    continue;
                }
            };

            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                debug!("skipping non-utf8 entry in {}", dir_path.display());
                continue;
            };

            let kind = match entry.file_type() {
                Ok(t) if t.is_file() => EntryKind::File,
                Ok(t) if t.is_dir() => EntryKind::Dir,
                Ok(_) => EntryKind::Other,
                Err(e) => {
                    debug!("skipping {name}: {e}");
                    continue;
                }
            };

            entries.push(SourceEntry { name, kind });
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read_to_string(&self, path: &str) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path))
    }
}

/// A migration script compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedMigration {
    pub file_name: &'static str,
    pub sql: &'static str,
}

/// Migration scripts held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: BTreeMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source whose `migrations/` directory holds `migrations`.
    pub fn from_embedded(migrations: &[EmbeddedMigration]) -> Self {
        let mut source = Self::new();
        for m in migrations {
            source.add_migration(m.file_name, m.sql);
        }
        source
    }

    /// Add a file at an arbitrary path.
    pub fn insert(&mut self, path: impl Into<String>, contents: impl Into<String>) {
        self.files.insert(path.into(), contents.into());
    }

    /// Add a script to the migrations directory.
    pub fn add_migration(&mut self, file_name: &str, sql: impl Into<String>) {
        self.insert(migration_path(file_name), sql);
    }

    pub fn with_migration(mut self, file_name: &str, sql: impl Into<String>) -> Self {
        self.add_migration(file_name, sql);
        self
    }
}

impl MigrationSource for MemorySource {
    fn read_dir(&self, dir: &str) -> io::Result<Vec<SourceEntry>> {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut entries: BTreeMap<String, EntryKind> = BTreeMap::new();

        for path in self.files.keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                Some((sub, _)) => {
                    entries.insert(sub.to_string(), EntryKind::Dir);
                }
                None => {
                    entries.insert(rest.to_string(), EntryKind::File);
                }
            }
        }

        if entries.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{dir}: no such directory"),
            ));
        }

        Ok(entries
            .into_iter()
            .map(|(name, kind)| SourceEntry { name, kind })
            .collect())
    }

    fn read_to_string(&self, path: &str) -> io::Result<String> {
        self.files.get(path).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{path}: no such file"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_source_lists_sorted_with_kinds() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join(MIGRATIONS_DIR);
        std::fs::create_dir_all(dir.join("nested")).unwrap();
        std::fs::write(dir.join("2_b.sql"), "SELECT 2;").unwrap();
        std::fs::write(dir.join("1_a.sql"), "SELECT 1;").unwrap();

        let source = DirSource::new(tmp.path());
        let entries = source.read_dir(MIGRATIONS_DIR).unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["1_a.sql", "2_b.sql", "nested"]);
        assert!(entries[0].is_file());
        assert_eq!(entries[2].kind, EntryKind::Dir);

        let body = source.read_to_string(&migration_path("1_a.sql")).unwrap();
        assert_eq!(body, "SELECT 1;");
    }

    #[test]
    fn dir_source_missing_directory_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirSource::new(tmp.path());
        let err = source.read_dir(MIGRATIONS_DIR).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn memory_source_lists_files_and_subdirectories() {
        let mut source = MemorySource::new()
            .with_migration("2_b.sql", "SELECT 2;")
            .with_migration("1_a.sql", "SELECT 1;");
        source.insert("migrations/old/0_x.sql", "SELECT 0;");
        source.insert("other/readme.md", "hi");

        let entries = source.read_dir("migrations").unwrap();
        assert_eq!(
            entries,
            vec![
                SourceEntry::file("1_a.sql"),
                SourceEntry::file("2_b.sql"),
                SourceEntry {
                    name: "old".into(),
                    kind: EntryKind::Dir,
                },
            ]
        );
    }

    #[test]
    fn memory_source_missing_directory_is_an_error() {
        let source = MemorySource::new().with_migration("1_a.sql", "SELECT 1;");
        assert!(source.read_dir("elsewhere").is_err());
        assert!(source.read_to_string("migrations/9_z.sql").is_err());
    }

    #[test]
    fn embedded_migrations_land_in_migrations_dir() {
        const SET: &[EmbeddedMigration] = &[EmbeddedMigration {
            file_name: "1_init.sql",
            sql: "CREATE TABLE t (id INTEGER);",
        }];
        let source = MemorySource::from_embedded(SET);
        assert_eq!(
            source.read_to_string("migrations/1_init.sql").unwrap(),
            "CREATE TABLE t (id INTEGER);"
        );
    }
}
