pub mod clustering;
pub mod geo;
pub mod similarity;
pub mod store;

pub use clustering::{
    audit, run_clustering, AuditViolation, ClusteringOutcome, GreedyIncidentBuilder, RunOptions,
};
pub use geo::{centroid, distance_meters, haversine_meters};
pub use similarity::cosine_similarity;
pub use store::{
    ComplaintSource, IncidentSink, MemoryComplaintStore, PgComplaintStore, SnapshotSource,
};
