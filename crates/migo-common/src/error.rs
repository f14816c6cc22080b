use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    /// Creating, dropping or reading the bookkeeping table failed.
    #[error("metadata table error: {0}")]
    Metadata(String),

    /// The migrations directory itself could not be enumerated.
    #[error("listing error: {0}")]
    Listing(String),

    /// A failed migration could not be rolled back, so its final state is unknown.
    /// Callers must stop issuing work against the database.
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the error leaves the database in a state no later migration can trust.
    pub fn is_unrecoverable(&self) -> bool {
        matches!(self, Error::Unrecoverable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Metadata("no such table".into());
        assert_eq!(e.to_string(), "metadata table error: no such table");

        let e = Error::Listing("migrations: not found".into());
        assert_eq!(e.to_string(), "listing error: migrations: not found");

        let e = Error::Other("misc".into());
        assert_eq!(e.to_string(), "misc");
    }

    #[test]
    fn only_rollback_failures_are_unrecoverable() {
        assert!(Error::Unrecoverable("rollback refused".into()).is_unrecoverable());
        assert!(!Error::Database("locked".into()).is_unrecoverable());
        assert!(!Error::Listing("gone".into()).is_unrecoverable());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: Error = io.into();
        assert_eq!(e.to_string(), "io error: missing");
    }
}
