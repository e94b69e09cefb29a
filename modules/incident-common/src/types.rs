use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IncidentError, Result};

// --- Geo Types ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

// --- Complaints ---

/// One citizen-submitted report, already geolocated and embedded upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintRecord {
    pub id: i64,
    /// Only used to name the incident this record may anchor.
    pub title: String,
    pub received_at: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub district_id: i64,
    /// Empty when the upstream normalization has no vector for this record.
    pub embedding: Vec<f32>,
    /// Set at most once, by a committed clustering run.
    pub incident_id: Option<i64>,
    pub link_score: Option<f64>,
}

impl ComplaintRecord {
    /// Coordinates as a point, if both are present.
    pub fn point(&self) -> Option<GeoPoint> {
        match (self.lat, self.lon) {
            (Some(lat), Some(lon)) => Some(GeoPoint { lat, lon }),
            _ => None,
        }
    }

    pub fn require_point(&self) -> Result<GeoPoint> {
        self.point().ok_or(IncidentError::MissingGeoData {
            complaint_id: self.id,
        })
    }

    pub fn is_unassigned(&self) -> bool {
        self.incident_id.is_none()
    }
}

// --- Incidents ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Open => "OPEN",
            IncidentStatus::InProgress => "IN_PROGRESS",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for IncidentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IncidentStatus {
    type Err = IncidentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OPEN" => Ok(IncidentStatus::Open),
            "IN_PROGRESS" => Ok(IncidentStatus::InProgress),
            "RESOLVED" => Ok(IncidentStatus::Resolved),
            "CLOSED" => Ok(IncidentStatus::Closed),
            other => Err(IncidentError::Config(format!(
                "unknown incident status '{other}'"
            ))),
        }
    }
}

/// A complaint's membership in a cluster, scored against the pivot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MemberLink {
    pub complaint_id: i64,
    /// Cosine similarity to the pivot; exactly 1.0 for the pivot itself.
    pub link_score: f64,
}

/// A finalized cluster that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentDraft {
    pub pivot_id: i64,
    pub title: String,
    pub district_id: i64,
    pub centroid: GeoPoint,
    /// Pivot first, then members in scan order.
    pub members: Vec<MemberLink>,
}

impl IncidentDraft {
    pub fn member_ids(&self) -> impl Iterator<Item = i64> + '_ {
        self.members.iter().map(|m| m.complaint_id)
    }
}

/// A persisted incident.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    pub id: i64,
    pub title: String,
    pub district_id: i64,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub status: IncidentStatus,
    pub opened_at: DateTime<Utc>,
}

/// Listing row for an incident and its member complaints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentSummary {
    pub id: i64,
    pub title: String,
    pub status: IncidentStatus,
    pub complaint_count: i64,
    pub first_received_at: Option<DateTime<Utc>>,
    pub last_received_at: Option<DateTime<Utc>>,
    pub opened_at: DateTime<Utc>,
}

impl IncidentSummary {
    /// Human-facing code, e.g. `I-2026-0042`.
    pub fn display_code(&self) -> String {
        format!("I-{}-{:04}", self.opened_at.year(), self.id)
    }
}

/// Filter for incident listings.
#[derive(Debug, Clone)]
pub struct IncidentFilter {
    pub status: Option<IncidentStatus>,
    pub min_members: i64,
    pub limit: i64,
}

impl IncidentFilter {
    /// Open incidents with at least five complaints.
    pub fn major() -> Self {
        Self {
            status: Some(IncidentStatus::Open),
            min_members: 5,
            limit: 100,
        }
    }
}

impl Default for IncidentFilter {
    fn default() -> Self {
        Self {
            status: None,
            min_members: 2,
            limit: 100,
        }
    }
}

// --- Run statistics ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterStats {
    pub run_id: Uuid,
    pub records_processed: u32,
    pub incidents_created: u32,
    pub complaints_linked: u32,
    pub singletons: u32,
    pub skipped_pairs: u32,
    pub dry_run: bool,
}

impl ClusterStats {
    pub fn empty(run_id: Uuid, dry_run: bool) -> Self {
        Self {
            run_id,
            records_processed: 0,
            incidents_created: 0,
            complaints_linked: 0,
            singletons: 0,
            skipped_pairs: 0,
            dry_run,
        }
    }
}
