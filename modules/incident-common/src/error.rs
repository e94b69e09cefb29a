use thiserror::Error;

/// Result type alias for incident clustering operations.
pub type Result<T> = std::result::Result<T, IncidentError>;

#[derive(Error, Debug)]
pub enum IncidentError {
    /// A complaint has no usable coordinates.
    #[error("complaint {complaint_id} has no coordinates")]
    MissingGeoData { complaint_id: i64 },

    /// Similarity scoring failed for a pair of embeddings (zero vector,
    /// empty vector, or mismatched dimensionality).
    #[error("computation error: {0}")]
    Computation(String),

    /// The sink could not create an incident or link a member.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// Snapshot input could not be read or parsed.
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// The clustering pass itself did not complete (panic or cancellation).
    #[error("clustering task failed: {0}")]
    ClusteringTask(String),

    /// The partition audit found violations; nothing was committed.
    #[error("clustering invariants violated ({0} violations)")]
    InvariantViolated(usize),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl IncidentError {
    pub fn computation(msg: impl Into<String>) -> Self {
        Self::Computation(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
