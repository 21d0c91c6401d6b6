use thiserror::Error;

/// Failures while scanning the raw archive file.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt archive: {0}")]
    Corrupt(&'static str),

    #[error("unsupported archive: {0}")]
    Unsupported(&'static str),
}

/// Fatal ingestion failures. Any of these aborts the whole pass; no partial
/// model is ever marked ready.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("multiple plans unsupported")]
    DuplicatePlan,

    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Per-request query failures. Always answered as a 400-class response and
/// never escalate beyond the single request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("data not ready")]
    NotReady,

    #[error("ingestion failed")]
    IngestFailed,

    #[error("time not specified")]
    TimeNotSpecified,

    #[error("no data found")]
    NotFound,

    #[error("no plan loaded")]
    NoPlan,
}
