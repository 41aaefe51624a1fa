//! error kinds shared across the dispatcher, allocator, lease manager and store

use thiserror::Error;

/// errors surfaced by dhcpd-core
///
/// per-packet errors are logged and dropped by the caller; only [`Error::Fatal`]
/// should ever terminate the process.
#[derive(Debug, Error)]
pub enum Error {
    /// a MAC, IPv4 address, netmask, or ACL action failed to parse
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// a uniqueness constraint in the store was violated
    ///
    /// in the admin surface this is returned to the caller; in the allocator
    /// it is interpreted as "address taken" and allocation resumes.
    #[error("conflict: {0}")]
    Conflict(String),

    /// no row matched the requested key
    #[error("not found")]
    NotFound,

    /// the dynamic range has no free address left to offer
    #[error("address range exhausted")]
    RangeExhausted,

    /// a client's bound address is currently leased to a different client
    #[error("bound address {0} is leased to another client")]
    BoundAddressStolen(std::net::Ipv4Addr),

    /// the store could not be reached or returned an unexpected failure
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// an unrecoverable startup condition; the process should exit
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound,
            sqlx::Error::Database(db_err) if is_unique_violation(db_err.as_ref()) => {
                Error::Conflict(db_err.message().to_string())
            }
            other => Error::StoreUnavailable(other.to_string()),
        }
    }
}

fn is_unique_violation(db_err: &dyn sqlx::error::DatabaseError) -> bool {
    // SQLite reports unique/primary-key violations with this constraint name;
    // sqlx doesn't normalize error codes across backends so we match on it directly.
    db_err
        .code()
        .map(|code| code == "2067" || code == "1555")
        .unwrap_or(false)
}
