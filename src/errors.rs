//! Error types for the connection pool

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Lease did not complete within {0:?}")]
    Timeout(std::time::Duration),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Lease was cancelled")]
    Cancelled,

    #[error("Connection pool is shut down")]
    ShutDown,
}

pub type PoolResult<T> = Result<T, PoolError>;
