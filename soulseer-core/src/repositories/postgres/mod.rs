// src/repositories/postgres/mod.rs

pub mod user;
pub mod reader;
pub mod session;
pub mod message;
pub mod ledger;

pub use user::PostgresUserRepository;
pub use reader::PostgresReaderRepository;
pub use session::PostgresSessionRepository;
pub use message::PostgresMessageRepository;
pub use ledger::PostgresLedgerRepository;

/// Postgres SQLSTATE for unique_violation.
pub(crate) const UNIQUE_VIOLATION: &str = "23505";

/// True if `e` is a unique-constraint violation on the named index.
pub(crate) fn is_unique_violation(e: &sqlx::Error, constraint: &str) -> bool {
    match e.as_database_error() {
        Some(db_err) => {
            db_err.code().as_deref() == Some(UNIQUE_VIOLATION)
                && db_err.constraint() == Some(constraint)
        }
        None => false,
    }
}
