pub mod audit;
pub mod builder;
pub mod job;

pub use audit::{audit, AuditViolation};
pub use builder::{ClusteringOutcome, GreedyIncidentBuilder};
pub use job::{run_clustering, RunOptions};
