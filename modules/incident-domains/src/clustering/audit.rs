//! Post-build checks of the partition properties.
//!
//! Recomputes every bound from the input records, independent of the
//! builder's bookkeeping, so a violation points at a real defect rather than
//! a stale score.

use std::collections::{HashMap, HashSet};

use incident_common::{ClusteringConfig, ComplaintRecord, GeoPoint};
use thiserror::Error;

use super::builder::{similarity_to_pivot, ClusteringOutcome};
use crate::geo::{centroid, distance_meters};

const TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuditViolation {
    #[error("complaint {complaint_id} is not part of the input batch")]
    UnknownComplaint { complaint_id: i64 },

    #[error("complaint {complaint_id} was already linked to incident {incident_id}")]
    AlreadyAssigned { complaint_id: i64, incident_id: i64 },

    #[error("complaint {complaint_id} appears more than once in the partition")]
    DuplicateAssignment { complaint_id: i64 },

    #[error("incident anchored at {pivot_id} has {members} member(s)")]
    TooFewMembers { pivot_id: i64, members: usize },

    #[error("incident anchored at {pivot_id} does not list its pivot first with score 1.0")]
    PivotNotFirst { pivot_id: i64 },

    #[error("complaint {complaint_id} is in district {district_id}, incident {pivot_id} in {incident_district}")]
    DistrictMismatch {
        pivot_id: i64,
        complaint_id: i64,
        district_id: i64,
        incident_district: i64,
    },

    #[error("complaint {complaint_id} is {days} days from pivot {pivot_id}")]
    OutsideTimeWindow { pivot_id: i64, complaint_id: i64, days: i64 },

    #[error("complaint {complaint_id} is {meters:.1}m from pivot {pivot_id}")]
    OutsideRadius { pivot_id: i64, complaint_id: i64, meters: f64 },

    #[error("complaint {complaint_id} has similarity {score:.4} to pivot {pivot_id}")]
    BelowSimilarity { pivot_id: i64, complaint_id: i64, score: f64 },

    #[error("complaint {complaint_id} link score {recorded:.6} differs from {expected:.6}")]
    LinkScoreMismatch {
        complaint_id: i64,
        recorded: f64,
        expected: f64,
    },

    #[error("incident anchored at {pivot_id} has centroid {recorded:?}, expected {expected:?}")]
    CentroidMismatch {
        pivot_id: i64,
        recorded: GeoPoint,
        expected: Option<GeoPoint>,
    },
}

/// Check `outcome` against the records it was built from.
pub fn audit(
    records: &[ComplaintRecord],
    outcome: &ClusteringOutcome,
    config: &ClusteringConfig,
) -> Vec<AuditViolation> {
    let by_id: HashMap<i64, &ComplaintRecord> = records.iter().map(|r| (r.id, r)).collect();
    let mut seen: HashSet<i64> = HashSet::new();
    let mut violations = Vec::new();

    let mut note_seen = |id: i64, violations: &mut Vec<AuditViolation>| {
        if !seen.insert(id) {
            violations.push(AuditViolation::DuplicateAssignment { complaint_id: id });
        }
    };

    for &id in &outcome.singletons {
        note_seen(id, &mut violations);
    }

    for incident in &outcome.incidents {
        if incident.members.len() < 2 {
            violations.push(AuditViolation::TooFewMembers {
                pivot_id: incident.pivot_id,
                members: incident.members.len(),
            });
        }
        match incident.members.first() {
            Some(first) if first.complaint_id == incident.pivot_id && first.link_score == 1.0 => {}
            _ => violations.push(AuditViolation::PivotNotFirst {
                pivot_id: incident.pivot_id,
            }),
        }

        let Some(pivot) = by_id.get(&incident.pivot_id).copied() else {
            violations.push(AuditViolation::UnknownComplaint {
                complaint_id: incident.pivot_id,
            });
            continue;
        };

        let mut points = Vec::with_capacity(incident.members.len());
        for link in &incident.members {
            note_seen(link.complaint_id, &mut violations);

            let Some(member) = by_id.get(&link.complaint_id).copied() else {
                violations.push(AuditViolation::UnknownComplaint {
                    complaint_id: link.complaint_id,
                });
                continue;
            };
            if let Some(incident_id) = member.incident_id {
                violations.push(AuditViolation::AlreadyAssigned {
                    complaint_id: member.id,
                    incident_id,
                });
            }
            if let Some(point) = member.point() {
                points.push(point);
            }
            if member.district_id != incident.district_id {
                violations.push(AuditViolation::DistrictMismatch {
                    pivot_id: pivot.id,
                    complaint_id: member.id,
                    district_id: member.district_id,
                    incident_district: incident.district_id,
                });
            }
            if member.id == pivot.id {
                continue;
            }

            let days = (pivot.received_at - member.received_at).num_days().abs();
            if days > config.time_threshold_days {
                violations.push(AuditViolation::OutsideTimeWindow {
                    pivot_id: pivot.id,
                    complaint_id: member.id,
                    days,
                });
            }

            let meters = distance_meters(pivot.point(), member.point());
            if meters > config.distance_threshold_meters {
                violations.push(AuditViolation::OutsideRadius {
                    pivot_id: pivot.id,
                    complaint_id: member.id,
                    meters,
                });
            }

            match similarity_to_pivot(pivot, member, config) {
                Ok(score) => {
                    if score < config.similarity_threshold {
                        violations.push(AuditViolation::BelowSimilarity {
                            pivot_id: pivot.id,
                            complaint_id: member.id,
                            score,
                        });
                    }
                    if (score - link.link_score).abs() > TOLERANCE {
                        violations.push(AuditViolation::LinkScoreMismatch {
                            complaint_id: member.id,
                            recorded: link.link_score,
                            expected: score,
                        });
                    }
                }
                Err(_) => violations.push(AuditViolation::BelowSimilarity {
                    pivot_id: pivot.id,
                    complaint_id: member.id,
                    score: f64::NAN,
                }),
            }
        }

        let expected = centroid(&points).filter(|_| points.len() == incident.members.len());
        let matches = expected.is_some_and(|c| {
            (c.lat - incident.centroid.lat).abs() <= TOLERANCE
                && (c.lon - incident.centroid.lon).abs() <= TOLERANCE
        });
        if !matches {
            violations.push(AuditViolation::CentroidMismatch {
                pivot_id: incident.pivot_id,
                recorded: incident.centroid,
                expected,
            });
        }
    }

    violations
}
