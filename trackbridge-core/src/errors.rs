//! Errors surfaced by a reconciliation run

use crate::clients::ClientError;
use crate::correlation::StoreError;
use thiserror::Error;

pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("invalid sync configuration for project '{0}'")]
    InvalidConfiguration(String),

    #[error("missing data: {0}")]
    MissingData(String),
}

impl SyncError {
    pub fn missing(what: impl Into<String>) -> Self {
        SyncError::MissingData(what.into())
    }
}
