pub mod applier;
pub mod connection;
pub mod context;
pub mod filename;
pub mod metadata;
pub mod migrator;
pub mod selector;
pub mod source;

pub use applier::Outcome;
pub use connection::{Connection, SqlValue, Transaction};
pub use context::RunContext;
pub use filename::{MigrationFile, ParseError};
pub use metadata::{MetadataStore, MigrationRecord};
pub use migrator::{FileReport, MigrationReport, Migrator, StatusReport};
pub use source::{DirSource, EmbeddedMigration, MemorySource, MigrationSource};
