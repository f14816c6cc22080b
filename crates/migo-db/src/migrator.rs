use std::fmt;

use migo_common::Result;
use tracing::{info, warn};

use crate::applier::{Outcome, apply_migration};
use crate::connection::Connection;
use crate::context::RunContext;
use crate::filename::MigrationFile;
use crate::metadata::{MetadataStore, MigrationRecord};
use crate::selector::{forward_migrations, pending_migrations, rollback_files};
use crate::source::MigrationSource;

/// Applies pending forward migrations and manages the bookkeeping table.
#[derive(Debug, Clone, Default)]
pub struct Migrator {
    store: MetadataStore,
}

/// The result of one migration file within a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub file: MigrationFile,
    pub outcome: Outcome,
}

impl fmt::Display for FileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Applied => write!(f, "Migrated {}", self.file.file_name),
            Outcome::Failed(e) => {
                write!(f, "Error migrating {}, error: {e}", self.file.file_name)
            }
            Outcome::Deferred(e) => write!(f, "Deferred {}: {e}", self.file.file_name),
        }
    }
}

/// Per-file outcomes of an `apply` run, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub files: Vec<FileReport>,
    /// Set when the run stopped early; see [`RunContext`].
    pub cancelled: Option<String>,
}

impl MigrationReport {
    pub fn applied(&self) -> impl Iterator<Item = &MigrationFile> {
        self.files
            .iter()
            .filter(|r| r.outcome.is_applied())
            .map(|r| &r.file)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileReport> {
        self.files
            .iter()
            .filter(|r| matches!(r.outcome, Outcome::Failed(_)))
    }

    pub fn applied_count(&self) -> usize {
        self.applied().count()
    }

    fn push_deferred(&mut self, file: MigrationFile, reason: String) {
        self.files.push(FileReport {
            file,
            outcome: Outcome::Deferred(reason),
        });
    }

    /// True when every attempted file applied and the run was not cut short.
    pub fn is_success(&self) -> bool {
        self.cancelled.is_none() && self.files.iter().all(|r| r.outcome.is_applied())
    }
}

/// Read-only view of applied and outstanding migrations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub applied: Vec<MigrationRecord>,
    pub pending: Vec<MigrationFile>,
    pub rollback_files: Vec<MigrationFile>,
}

impl Migrator {
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Run every pending forward migration, one transaction per file.
    pub fn apply<C, S>(&self, conn: &mut C, source: &S) -> Result<MigrationReport>
    where
        C: Connection,
        S: MigrationSource + ?Sized,
    {
        self.apply_with(&RunContext::background(), conn, source)
    }

    /// Like [`Migrator::apply`], stopping between migrations once `ctx` is cancelled.
    ///
    /// Errors abort the whole run: the metadata table could not be created,
    /// the migrations directory could not be listed, or a failed migration
    /// could not be rolled back ([`migo_common::Error::Unrecoverable`]).
    /// Failures of individual migrations are reported in the returned report.
    pub fn apply_with<C, S>(&self, ctx: &RunContext, conn: &mut C, source: &S) -> Result<MigrationReport>
    where
        C: Connection,
        S: MigrationSource + ?Sized,
    {
        let mut report = MigrationReport::default();
        if let Some(reason) = ctx.cancellation() {
            report.cancelled = Some(reason.to_string());
            return Ok(report);
        }

        self.store.ensure_table(conn)?;
        let selection = pending_migrations(conn, source, &self.store)?;

        // Deferred files are reported where they sit in listing order.
        let mut deferred = selection.deferred.into_iter().peekable();

        for file in selection.pending {
            while let Some((earlier, reason)) =
                deferred.next_if(|(d, _)| (d.id, &d.file_name) < (file.id, &file.file_name))
            {
                report.push_deferred(earlier, reason);
            }

            if let Some(reason) = ctx.cancellation() {
                warn!("stopping before {}: {reason}", file.file_name);
                report.cancelled = Some(reason.to_string());
                break;
            }

            let outcome = apply_migration(conn, source, &self.store, &file)?;
            match &outcome {
                Outcome::Applied => info!("migrated {}", file.file_name),
                Outcome::Failed(e) => warn!("error migrating {}: {e}", file.file_name),
                Outcome::Deferred(_) => {}
            }
            report.files.push(FileReport { file, outcome });
        }

        for (file, reason) in deferred {
            report.push_deferred(file, reason);
        }

        Ok(report)
    }

    /// Drop the metadata table. Schema changes from applied migrations stay,
    /// and the next `apply` treats every forward migration as pending.
    pub fn purge<C: Connection>(&self, conn: &mut C) -> Result<()> {
        self.purge_with(&RunContext::background(), conn)
    }

    pub fn purge_with<C: Connection>(&self, ctx: &RunContext, conn: &mut C) -> Result<()> {
        if let Some(reason) = ctx.cancellation() {
            return Err(migo_common::Error::Other(format!("purge not started: {reason}")));
        }
        self.store.drop_table(conn)?;
        info!("dropped {}", self.store.table());
        Ok(())
    }

    /// Applied records and outstanding files. Does not create the metadata table.
    pub fn status<C, S>(&self, conn: &mut C, source: &S) -> Result<StatusReport>
    where
        C: Connection,
        S: MigrationSource + ?Sized,
    {
        let applied = self.store.records(conn)?;
        let pending = forward_migrations(source)?
            .into_iter()
            .filter(|file| !applied.iter().any(|r| r.id == file.id))
            .collect();

        Ok(StatusReport {
            applied,
            pending,
            rollback_files: rollback_files(source)?,
        })
    }
}
