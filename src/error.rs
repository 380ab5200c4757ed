use thiserror::Error;

pub type Result<T> = std::result::Result<T, OutcomeError>;

/// Failures that stop the snapshot from being built or a command from
/// completing.
#[derive(Error, Debug)]
pub enum OutcomeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed {table} table at line {line}: {reason}")]
    MalformedReference {
        table: &'static str,
        line: u64,
        reason: String,
    },

    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Client-facing validation failures for façade queries.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("no measure provided")]
    MissingMeasure,

    #[error("no trend table was loaded")]
    NoTrendData,
}

/// Contract violations by the caller of the percentile engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RankError {
    #[error("invalid cohort scope: {0}")]
    InvalidScope(String),
}
