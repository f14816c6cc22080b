//! Migration filename rules.
//!
//! Forward migrations are named `<int>[_<description>].sql`, rollback files
//! `<int>[_<description>]_rollback.sql`. The integer prefix is the migration's
//! identifier and its primary key in the metadata table.

use thiserror::Error;

/// Suffix every migration script carries.
pub const SQL_SUFFIX: &str = ".sql";

/// Suffix marking a rollback script. Recognized, never executed.
pub const ROLLBACK_SUFFIX: &str = "_rollback.sql";

/// Default upper bound on a stored display name, in characters.
pub const NAME_LIMIT: usize = 100;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("not a sql file, {0}")]
    NotSqlFile(String),

    #[error("filename is not prefixed by an integer, {0}")]
    NoIntegerPrefix(String),
}

/// Parse the integer prefix of a migration filename.
///
/// The `.sql` suffix is stripped first, then everything up to the first `_`
/// must parse as an integer.
pub fn parse_identifier(filename: &str) -> Result<i64, ParseError> {
    let stem = filename
        .strip_suffix(SQL_SUFFIX)
        .ok_or_else(|| ParseError::NotSqlFile(filename.to_string()))?;

    let prefix = stem.split('_').next().unwrap_or_default();
    prefix
        .parse::<i64>()
        .map_err(|_| ParseError::NoIntegerPrefix(stem.to_string()))
}

pub fn is_forward_migration_file(filename: &str) -> bool {
    filename.ends_with(SQL_SUFFIX)
        && !filename.ends_with(ROLLBACK_SUFFIX)
        && parse_identifier(filename).is_ok()
}

pub fn is_rollback_file(filename: &str) -> bool {
    match filename.strip_suffix(ROLLBACK_SUFFIX) {
        Some(prefix) => prefix.split('_').next().unwrap_or_default().parse::<i64>().is_ok(),
        None => false,
    }
}

/// Truncate a display name longer than `limit` characters to `limit - 1`
/// characters. The one-character margin is part of the stored contract.
pub fn truncate_name(name: &str, limit: usize) -> String {
    if name.chars().count() > limit {
        name.chars().take(limit.saturating_sub(1)).collect()
    } else {
        name.to_string()
    }
}

/// A migration script recognized in the migrations directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub id: i64,
    /// Name as listed in the migrations directory.
    pub file_name: String,
    /// Name recorded in the metadata table, at most [`NAME_LIMIT`] characters.
    pub display_name: String,
    pub is_rollback: bool,
}

impl MigrationFile {
    /// Classify `file_name`, or return why it is not a migration script.
    pub fn parse(file_name: &str) -> Result<Self, ParseError> {
        let id = parse_identifier(file_name)?;

        if is_rollback_file(file_name) {
            let stem = file_name.strip_suffix(SQL_SUFFIX).unwrap_or(file_name);
            return Ok(Self {
                id,
                file_name: file_name.to_string(),
                display_name: truncate_name(stem, NAME_LIMIT),
                is_rollback: true,
            });
        }

        Ok(Self {
            id,
            file_name: file_name.to_string(),
            display_name: truncate_name(file_name, NAME_LIMIT),
            is_rollback: false,
        })
    }

    /// Like [`MigrationFile::parse`], but only accepts forward migrations.
    pub fn forward(file_name: &str) -> Option<Self> {
        if !is_forward_migration_file(file_name) {
            return None;
        }
        Self::parse(file_name).ok()
    }
}
