use std::cmp::Ordering;
use std::collections::BTreeMap;

use incident_common::{
    ClusteringConfig, ComplaintRecord, IncidentDraft, IncidentError, MemberLink, Result,
};
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::geo::{centroid, distance_meters};
use crate::similarity::cosine_similarity;

const INCIDENT_TITLE_SUFFIX: &str = "related recurring complaint";

/// Result of one greedy pass over a batch.
#[derive(Debug, Clone, Default)]
pub struct ClusteringOutcome {
    /// Finalized clusters in processing order (pivot newest first).
    pub incidents: Vec<IncidentDraft>,
    /// Pivots that found no match. Final for this run.
    pub singletons: Vec<i64>,
    /// Pairs dropped because their similarity could not be computed.
    pub skipped_pairs: u32,
}

impl ClusteringOutcome {
    /// Number of complaints that will be linked to an incident.
    pub fn linked_count(&self) -> usize {
        self.incidents.iter().map(|i| i.members.len()).sum()
    }
}

/// Single-pass, pivot-centered greedy clustering.
///
/// Records are visited newest first. Each unvisited record becomes a pivot
/// and claims every later unvisited record that passes the filter chain
/// against the pivot alone, so clusters are star-shaped around their pivot.
pub struct GreedyIncidentBuilder {
    config: ClusteringConfig,
}

impl GreedyIncidentBuilder {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Partition `records` into incidents and singletons.
    ///
    /// Records that already carry an incident are ignored. The batch is
    /// sharded by district; shards never interact, so running them on the
    /// rayon pool yields the same partition as one sequential pass.
    pub fn build(&self, records: &[ComplaintRecord]) -> ClusteringOutcome {
        let mut shards: BTreeMap<i64, Vec<&ComplaintRecord>> = BTreeMap::new();
        for record in records {
            if !record.is_unassigned() {
                debug!(complaint_id = record.id, "Ignoring already-assigned complaint");
                continue;
            }
            shards.entry(record.district_id).or_default().push(record);
        }
        for shard in shards.values_mut() {
            shard.sort_by(|a, b| processing_order(a, b));
        }

        let span = tracing::Span::current();
        let passes: Vec<PassOutcome<'_>> = if self.config.parallel_districts {
            shards
                .par_iter()
                .map(|(_, shard)| {
                    let _guard = span.enter();
                    greedy_pass(shard, &self.config)
                })
                .collect()
        } else {
            shards
                .values()
                .map(|shard| greedy_pass(shard, &self.config))
                .collect()
        };

        let mut clusters = Vec::new();
        let mut singletons = Vec::new();
        let mut skipped_pairs = 0;
        for pass in passes {
            clusters.extend(pass.clusters);
            singletons.extend(pass.singletons);
            skipped_pairs += pass.skipped_pairs;
        }
        clusters.sort_by(|(a, _), (b, _)| processing_order(a, b));
        singletons.sort_by(|a, b| processing_order(a, b));

        ClusteringOutcome {
            incidents: clusters.into_iter().map(|(_, draft)| draft).collect(),
            singletons: singletons.into_iter().map(|r| r.id).collect(),
            skipped_pairs,
        }
    }
}

/// Newest first; equal timestamps by ascending id.
fn processing_order(a: &ComplaintRecord, b: &ComplaintRecord) -> Ordering {
    b.received_at
        .cmp(&a.received_at)
        .then_with(|| a.id.cmp(&b.id))
}

struct PassOutcome<'a> {
    clusters: Vec<(&'a ComplaintRecord, IncidentDraft)>,
    singletons: Vec<&'a ComplaintRecord>,
    skipped_pairs: u32,
}

/// Greedy pass over one district, `sorted` in processing order.
fn greedy_pass<'a>(sorted: &[&'a ComplaintRecord], config: &ClusteringConfig) -> PassOutcome<'a> {
    let mut visited = vec![false; sorted.len()];
    let mut outcome = PassOutcome {
        clusters: Vec::new(),
        singletons: Vec::new(),
        skipped_pairs: 0,
    };

    for i in 0..sorted.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;
        let pivot = sorted[i];

        let mut members: Vec<(&ComplaintRecord, f64)> = vec![(pivot, 1.0)];

        // Full scan: no early break on the time window.
        for j in (i + 1)..sorted.len() {
            if visited[j] {
                continue;
            }
            let candidate = sorted[j];
            match evaluate_candidate(pivot, candidate, config) {
                Ok(Some(score)) => {
                    visited[j] = true;
                    members.push((candidate, score));
                }
                Ok(None) => {}
                Err(e) => {
                    outcome.skipped_pairs += 1;
                    warn!(
                        pivot_id = pivot.id,
                        complaint_id = candidate.id,
                        error = %e,
                        "Skipping pair: similarity could not be computed"
                    );
                }
            }
        }

        if members.len() < 2 {
            outcome.singletons.push(pivot);
            continue;
        }

        match finalize(pivot, &members) {
            Ok(draft) => {
                debug!(
                    pivot_id = pivot.id,
                    district_id = pivot.district_id,
                    members = draft.members.len(),
                    "Incident cluster formed"
                );
                outcome.clusters.push((pivot, draft));
            }
            Err(e) => {
                // Members were claimed by this pivot; they stay unassigned.
                warn!(pivot_id = pivot.id, error = %e, "Dropping cluster without centroid");
                outcome.singletons.extend(members.iter().map(|(r, _)| *r));
            }
        }
    }

    outcome
}

/// Run the filter chain for one candidate against the pivot.
///
/// Cheap, high-rejection tests first: district, time window, distance, then
/// cosine similarity. Returns `Ok(Some(score))` for a match, `Ok(None)` for a
/// rejection, and `Err` when the similarity could not be computed.
pub fn evaluate_candidate(
    pivot: &ComplaintRecord,
    candidate: &ComplaintRecord,
    config: &ClusteringConfig,
) -> Result<Option<f64>> {
    if !same_district(pivot, candidate) {
        return Ok(None);
    }
    if !within_time_window(pivot, candidate, config.time_threshold_days) {
        return Ok(None);
    }
    if !within_radius(pivot, candidate, config.distance_threshold_meters) {
        return Ok(None);
    }
    let score = similarity_to_pivot(pivot, candidate, config)?;
    if score >= config.similarity_threshold {
        Ok(Some(score))
    } else {
        Ok(None)
    }
}

pub fn same_district(pivot: &ComplaintRecord, candidate: &ComplaintRecord) -> bool {
    pivot.district_id == candidate.district_id
}

/// Elapsed whole days between the two submissions, in either direction.
pub fn within_time_window(pivot: &ComplaintRecord, candidate: &ComplaintRecord, days: i64) -> bool {
    (pivot.received_at - candidate.received_at).num_days().abs() <= days
}

pub fn within_radius(pivot: &ComplaintRecord, candidate: &ComplaintRecord, meters: f64) -> bool {
    distance_meters(pivot.point(), candidate.point()) <= meters
}

/// Cosine similarity of the two embeddings, enforcing the configured
/// dimensionality when one is set.
pub fn similarity_to_pivot(
    pivot: &ComplaintRecord,
    candidate: &ComplaintRecord,
    config: &ClusteringConfig,
) -> Result<f64> {
    if let Some(dim) = config.embedding_dim {
        for record in [pivot, candidate] {
            if record.embedding.len() != dim {
                return Err(IncidentError::computation(format!(
                    "complaint {} has {} dimensions, expected {dim}",
                    record.id,
                    record.embedding.len()
                )));
            }
        }
    }
    cosine_similarity(&pivot.embedding, &candidate.embedding)
}

pub fn incident_title(pivot_title: &str) -> String {
    format!("[{pivot_title}] {INCIDENT_TITLE_SUFFIX}")
}

fn finalize(pivot: &ComplaintRecord, members: &[(&ComplaintRecord, f64)]) -> Result<IncidentDraft> {
    let points = members
        .iter()
        .map(|(r, _)| r.require_point())
        .collect::<Result<Vec<_>>>()?;
    let centroid = centroid(&points).ok_or(IncidentError::MissingGeoData {
        complaint_id: pivot.id,
    })?;

    Ok(IncidentDraft {
        pivot_id: pivot.id,
        title: incident_title(&pivot.title),
        district_id: pivot.district_id,
        centroid,
        members: members
            .iter()
            .map(|(r, score)| MemberLink {
                complaint_id: r.id,
                link_score: *score,
            })
            .collect(),
    })
}
