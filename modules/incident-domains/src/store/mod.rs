//! Boundaries of the clustering run: where complaints come from and where
//! incidents go.

pub mod memory;
pub mod postgres;
pub mod snapshot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_common::{ComplaintRecord, Incident, IncidentDraft, Result};

pub use memory::MemoryComplaintStore;
pub use postgres::PgComplaintStore;
pub use snapshot::{parse_vector_literal, SnapshotSource};

/// Supplies the candidate set: complaints with no incident and with both
/// coordinates, each carrying its embedding. Order is irrelevant.
#[async_trait]
pub trait ComplaintSource: Send + Sync {
    async fn unassigned(&self) -> Result<Vec<ComplaintRecord>>;
}

/// Persists finalized clusters.
///
/// `persist` is all-or-nothing: either every draft becomes an OPEN incident
/// with every member linked (incident id, `linked_at`, link score), or
/// nothing is applied and a `Persistence` error is returned. Members that
/// were linked elsewhere in the meantime abort the commit.
#[async_trait]
pub trait IncidentSink: Send + Sync {
    async fn persist(
        &self,
        drafts: &[IncidentDraft],
        linked_at: DateTime<Utc>,
    ) -> Result<Vec<Incident>>;
}
