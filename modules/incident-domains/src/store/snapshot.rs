//! Read-only complaint source backed by a JSON export.
//!
//! A snapshot is a JSON array of complaint objects:
//!
//! ```json
//! [{ "id": 1, "title": "Pothole", "received_at": "2026-03-01T09:00:00Z",
//!    "lat": 37.56, "lon": 126.97, "district_id": 3,
//!    "embedding": "[0.12, -0.03, ...]" }]
//! ```
//!
//! `embedding` may be a number array or a textual vector literal as printed
//! by pgvector.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_common::{ComplaintRecord, IncidentError, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::ComplaintSource;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingField {
    Values(Vec<f32>),
    Literal(String),
}

#[derive(Debug, Deserialize)]
struct SnapshotRow {
    id: i64,
    #[serde(default)]
    title: Option<String>,
    received_at: DateTime<Utc>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    district_id: i64,
    #[serde(default)]
    embedding: Option<EmbeddingField>,
    #[serde(default)]
    incident_id: Option<i64>,
}

pub struct SnapshotSource {
    records: Vec<ComplaintRecord>,
}

impl SnapshotSource {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IncidentError::Snapshot(format!("failed to read {}: {e}", path.display()))
        })?;
        let source = Self::from_json(&raw)?;
        info!(
            path = %path.display(),
            records = source.records.len(),
            "Loaded complaint snapshot"
        );
        Ok(source)
    }

    /// Parse a snapshot, keeping only unassigned records with coordinates.
    pub fn from_json(raw: &str) -> Result<Self> {
        let rows: Vec<SnapshotRow> = serde_json::from_str(raw)
            .map_err(|e| IncidentError::Snapshot(format!("malformed snapshot: {e}")))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(incident_id) = row.incident_id {
                debug!(complaint_id = row.id, incident_id, "Excluding assigned complaint");
                continue;
            }
            let record = ComplaintRecord {
                id: row.id,
                title: row.title.unwrap_or_default(),
                received_at: row.received_at,
                lat: row.lat,
                lon: row.lon,
                district_id: row.district_id,
                embedding: Vec::new(),
                incident_id: None,
                link_score: None,
            };
            if let Err(e) = record.require_point() {
                debug!(complaint_id = row.id, reason = %e, "Excluding complaint");
                continue;
            }

            let embedding = match row.embedding {
                Some(EmbeddingField::Values(values)) => values,
                Some(EmbeddingField::Literal(text)) => match parse_vector_literal(&text) {
                    Ok(values) => values,
                    Err(e) => {
                        // Kept with an empty vector; its pairs are skipped.
                        warn!(complaint_id = row.id, error = %e, "Unparseable embedding");
                        Vec::new()
                    }
                },
                None => Vec::new(),
            };
            records.push(ComplaintRecord { embedding, ..record });
        }

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl ComplaintSource for SnapshotSource {
    async fn unassigned(&self) -> Result<Vec<ComplaintRecord>> {
        Ok(self.records.clone())
    }
}

/// Parse a textual vector such as `"[0.1, -0.2,3e-4]"`.
///
/// Brackets are optional. An empty literal yields an empty vector.
pub fn parse_vector_literal(text: &str) -> Result<Vec<f32>> {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim();
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .enumerate()
        .map(|(i, part)| {
            let part = part.trim();
            part.parse::<f32>().map_err(|e| {
                IncidentError::Snapshot(format!("vector component {i} ('{part}'): {e}"))
            })
        })
        .collect()
}
