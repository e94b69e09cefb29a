use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_common::{
    ComplaintRecord, Incident, IncidentDraft, IncidentError, IncidentFilter, IncidentStatus,
    IncidentSummary, Result,
};
use pgvector::Vector;
use sqlx::PgPool;
use tracing::{debug, info};

use super::{ComplaintSource, IncidentSink};

/// Complaint and incident tables in Postgres.
///
/// Columns are cast on read so that `numeric` coordinates, `timestamp`
/// columns and the `incident_status` enum all land in plain Rust types.
#[derive(Clone)]
pub struct PgComplaintStore {
    pool: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ComplaintRow {
    id: i64,
    title: Option<String>,
    received_at: DateTime<Utc>,
    lat: Option<f64>,
    lon: Option<f64>,
    district_id: i64,
    embedding: Option<Vector>,
}

impl From<ComplaintRow> for ComplaintRecord {
    fn from(row: ComplaintRow) -> Self {
        ComplaintRecord {
            id: row.id,
            title: row.title.unwrap_or_default(),
            received_at: row.received_at,
            lat: row.lat,
            lon: row.lon,
            district_id: row.district_id,
            embedding: row.embedding.map(|v| v.to_vec()).unwrap_or_default(),
            incident_id: None,
            link_score: None,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: i64,
    title: Option<String>,
    status: String,
    complaint_count: i64,
    first_received_at: Option<DateTime<Utc>>,
    last_received_at: Option<DateTime<Utc>>,
    opened_at: DateTime<Utc>,
}

impl PgComplaintStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Incident summaries, newest first, filtered by status and member count.
    pub async fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT
                i.id::int8                            AS id,
                i.title,
                i.status::text                        AS status,
                COUNT(c.id)::int8                     AS complaint_count,
                MIN(c.received_at)::timestamptz       AS first_received_at,
                MAX(c.received_at)::timestamptz       AS last_received_at,
                i.opened_at::timestamptz              AS opened_at
            FROM incidents i
            LEFT JOIN complaints c ON c.incident_id = i.id
            WHERE ($1::text IS NULL OR i.status::text = $1)
            GROUP BY i.id, i.title, i.status, i.opened_at
            HAVING COUNT(c.id) >= $2
            ORDER BY i.opened_at DESC, i.id DESC
            LIMIT $3
            "#,
        )
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.min_members)
        .bind(filter.limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(IncidentSummary::try_from).collect()
    }
}

impl TryFrom<SummaryRow> for IncidentSummary {
    type Error = IncidentError;

    fn try_from(row: SummaryRow) -> Result<Self> {
        let status = row.status.parse::<IncidentStatus>().map_err(|_| {
            IncidentError::persistence(format!(
                "incident {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        Ok(IncidentSummary {
            id: row.id,
            title: row.title.unwrap_or_default(),
            status,
            complaint_count: row.complaint_count,
            first_received_at: row.first_received_at,
            last_received_at: row.last_received_at,
            opened_at: row.opened_at,
        })
    }
}

#[async_trait]
impl ComplaintSource for PgComplaintStore {
    async fn unassigned(&self) -> Result<Vec<ComplaintRecord>> {
        let rows = sqlx::query_as::<_, ComplaintRow>(
            r#"
            SELECT
                c.id::int8                  AS id,
                c.title,
                c.received_at::timestamptz  AS received_at,
                c.lat::float8               AS lat,
                c.lon::float8               AS lon,
                c.district_id::int8         AS district_id,
                n.embedding
            FROM complaints c
            JOIN complaint_normalizations n ON n.complaint_id = c.id
            WHERE c.incident_id IS NULL
              AND c.lat IS NOT NULL
              AND c.lon IS NOT NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), "Fetched unassigned complaints");
        Ok(rows.into_iter().map(ComplaintRecord::from).collect())
    }
}

#[async_trait]
impl IncidentSink for PgComplaintStore {
    async fn persist(
        &self,
        drafts: &[IncidentDraft],
        linked_at: DateTime<Utc>,
    ) -> Result<Vec<Incident>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| IncidentError::persistence(format!("begin transaction: {e}")))?;

        let mut created = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let incident_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO incidents (title, district_id, centroid_lat, centroid_lon, status, opened_at)
                VALUES ($1, $2, $3, $4, 'OPEN', $5)
                RETURNING id::int8
                "#,
            )
            .bind(&draft.title)
            .bind(draft.district_id)
            .bind(draft.centroid.lat)
            .bind(draft.centroid.lon)
            .bind(linked_at)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                IncidentError::persistence(format!(
                    "insert incident for pivot {}: {e}",
                    draft.pivot_id
                ))
            })?;

            for link in &draft.members {
                let updated = sqlx::query(
                    r#"
                    UPDATE complaints
                    SET incident_id = $1,
                        incident_linked_at = $2,
                        incident_link_score = $3
                    WHERE id = $4 AND incident_id IS NULL
                    "#,
                )
                .bind(incident_id)
                .bind(linked_at)
                .bind(link.link_score)
                .bind(link.complaint_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    IncidentError::persistence(format!(
                        "link complaint {}: {e}",
                        link.complaint_id
                    ))
                })?;

                // Dropping the transaction rolls everything back.
                if updated.rows_affected() != 1 {
                    return Err(IncidentError::persistence(format!(
                        "complaint {} is missing or already linked to an incident",
                        link.complaint_id
                    )));
                }
            }

            created.push(Incident {
                id: incident_id,
                title: draft.title.clone(),
                district_id: draft.district_id,
                centroid_lat: draft.centroid.lat,
                centroid_lon: draft.centroid.lon,
                status: IncidentStatus::Open,
                opened_at: linked_at,
            });
        }

        tx.commit()
            .await
            .map_err(|e| IncidentError::persistence(format!("commit: {e}")))?;

        info!(incidents = created.len(), "Committed incidents");
        Ok(created)
    }
}
