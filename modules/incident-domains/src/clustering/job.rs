use chrono::Utc;
use incident_common::{ClusterStats, ClusteringConfig, IncidentError, Result};
use tokio::task::JoinError;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

use super::audit::audit;
use super::builder::GreedyIncidentBuilder;
use crate::store::{ComplaintSource, IncidentSink};

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Build and report, but persist nothing.
    pub dry_run: bool,
    /// Audit the partition before committing.
    pub verify: bool,
}

/// One clustering pass: fetch the candidate set, partition it, commit once.
///
/// Without a sink the run is a dry run. Nothing reaches the sink unless the
/// whole pass (and the audit, when enabled) succeeded.
pub async fn run_clustering(
    source: &dyn ComplaintSource,
    sink: Option<&dyn IncidentSink>,
    config: &ClusteringConfig,
    options: RunOptions,
) -> Result<ClusterStats> {
    config.validate()?;

    let run_id = Uuid::new_v4();
    let dry_run = options.dry_run || sink.is_none();
    let span = tracing::info_span!("clustering_run", %run_id, dry_run);

    run_pass(source, sink, config, options, run_id, dry_run)
        .instrument(span)
        .await
}

async fn run_pass(
    source: &dyn ComplaintSource,
    sink: Option<&dyn IncidentSink>,
    config: &ClusteringConfig,
    options: RunOptions,
    run_id: Uuid,
    dry_run: bool,
) -> Result<ClusterStats> {
    let records = source.unassigned().await?;
    if records.is_empty() {
        info!("No unassigned complaints to cluster");
        return Ok(ClusterStats::empty(run_id, dry_run));
    }
    info!(records = records.len(), "Clustering unassigned complaints");

    let builder = GreedyIncidentBuilder::new(config.clone());
    let span = tracing::Span::current();
    let (records, outcome) = tokio::task::spawn_blocking(move || {
        let _guard = span.enter();
        let outcome = builder.build(&records);
        (records, outcome)
    })
    .await
    .map_err(task_failed)?;

    if options.verify {
        let violations = audit(&records, &outcome, config);
        if !violations.is_empty() {
            for violation in &violations {
                error!(%violation, "Partition audit failed");
            }
            return Err(IncidentError::InvariantViolated(violations.len()));
        }
        info!(incidents = outcome.incidents.len(), "Partition audit passed");
    }

    let stats = ClusterStats {
        run_id,
        records_processed: records.len() as u32,
        incidents_created: outcome.incidents.len() as u32,
        complaints_linked: outcome.linked_count() as u32,
        singletons: outcome.singletons.len() as u32,
        skipped_pairs: outcome.skipped_pairs,
        dry_run,
    };

    if outcome.skipped_pairs > 0 {
        warn!(
            skipped_pairs = outcome.skipped_pairs,
            "Some pairs were skipped due to similarity errors"
        );
    }

    if let Some(sink) = sink {
        if !dry_run && !outcome.incidents.is_empty() {
            sink.persist(&outcome.incidents, Utc::now()).await?;
        }
    }

    info!(
        records_processed = stats.records_processed,
        incidents_created = stats.incidents_created,
        complaints_linked = stats.complaints_linked,
        singletons = stats.singletons,
        skipped_pairs = stats.skipped_pairs,
        dry_run,
        "Clustering run complete"
    );
    Ok(stats)
}

fn task_failed(e: JoinError) -> IncidentError {
    IncidentError::ClusteringTask(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panicking_pass_is_a_task_error() {
        let err = tokio::task::spawn_blocking(|| panic!("builder exploded"))
            .await
            .map_err(task_failed)
            .unwrap_err();
        assert!(matches!(err, IncidentError::ClusteringTask(_)));
        assert!(err.to_string().starts_with("clustering task failed"));
    }
}
