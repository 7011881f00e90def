use thiserror::Error;

use crate::cache::CacheError;
use crate::due_date::DueDateError;
use crate::source::SourceError;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Refresh failed for {account}: {source}")]
    Source {
        account: String,
        #[source]
        source: SourceError,
    },

    #[error("Could not load checkout data: {0}")]
    Storage(#[from] CacheError),

    #[error(transparent)]
    DueDate(#[from] DueDateError),

    #[error("Refresh task did not complete: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl SyncError {
    pub fn is_auth(&self) -> bool {
        matches!(self, SyncError::Source { source, .. } if source.is_auth())
    }
}
