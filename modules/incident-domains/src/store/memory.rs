use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use incident_common::{
    ComplaintRecord, Incident, IncidentDraft, IncidentError, IncidentFilter, IncidentStatus,
    IncidentSummary, Result,
};

use super::{ComplaintSource, IncidentSink};

/// In-memory complaint store for tests and local runs. Data is lost on drop.
///
/// Honours the same contract as the Postgres store: only unassigned
/// complaints with coordinates are yielded, and `persist` applies a batch
/// atomically.
pub struct MemoryComplaintStore {
    inner: Mutex<Inner>,
}

#[derive(Clone)]
struct Inner {
    complaints: Vec<ComplaintRecord>,
    incidents: Vec<Incident>,
    next_incident_id: i64,
    fail_on_incident: Option<usize>,
}

impl MemoryComplaintStore {
    pub fn new(complaints: Vec<ComplaintRecord>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                complaints,
                incidents: Vec::new(),
                next_incident_id: 1,
                fail_on_incident: None,
            }),
        }
    }

    /// Make the next `persist` fail when it reaches the `n`-th draft
    /// (zero-based). The failure is one-shot.
    pub fn fail_on_incident(&self, n: usize) -> Result<()> {
        self.lock()?.fail_on_incident = Some(n);
        Ok(())
    }

    /// All complaints, including assigned ones.
    pub fn complaints(&self) -> Result<Vec<ComplaintRecord>> {
        Ok(self.lock()?.complaints.clone())
    }

    pub fn incidents(&self) -> Result<Vec<Incident>> {
        Ok(self.lock()?.incidents.clone())
    }

    /// Incident summaries, newest first.
    pub fn list_incidents(&self, filter: &IncidentFilter) -> Result<Vec<IncidentSummary>> {
        let inner = self.lock()?;
        let mut summaries: Vec<IncidentSummary> = inner
            .incidents
            .iter()
            .filter(|i| filter.status.map_or(true, |s| s == i.status))
            .map(|incident| {
                let members: Vec<&ComplaintRecord> = inner
                    .complaints
                    .iter()
                    .filter(|c| c.incident_id == Some(incident.id))
                    .collect();
                IncidentSummary {
                    id: incident.id,
                    title: incident.title.clone(),
                    status: incident.status,
                    complaint_count: members.len() as i64,
                    first_received_at: members.iter().map(|c| c.received_at).min(),
                    last_received_at: members.iter().map(|c| c.received_at).max(),
                    opened_at: incident.opened_at,
                }
            })
            .filter(|s| s.complaint_count >= filter.min_members)
            .collect();
        summaries.sort_by(|a, b| b.opened_at.cmp(&a.opened_at).then(b.id.cmp(&a.id)));
        summaries.truncate(filter.limit.max(0) as usize);
        Ok(summaries)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| IncidentError::persistence("memory store lock poisoned"))
    }
}

impl Default for MemoryComplaintStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl ComplaintSource for MemoryComplaintStore {
    async fn unassigned(&self) -> Result<Vec<ComplaintRecord>> {
        Ok(self
            .lock()?
            .complaints
            .iter()
            .filter(|c| c.is_unassigned() && c.point().is_some())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl IncidentSink for MemoryComplaintStore {
    async fn persist(
        &self,
        drafts: &[IncidentDraft],
        linked_at: DateTime<Utc>,
    ) -> Result<Vec<Incident>> {
        let mut guard = self.lock()?;
        let fail_on = guard.fail_on_incident.take();

        // Work on a copy; publish only if the whole batch applies.
        let mut staged = guard.clone();
        staged.fail_on_incident = None;
        let mut created = Vec::with_capacity(drafts.len());
        let mut linked: HashSet<i64> = HashSet::new();

        for (n, draft) in drafts.iter().enumerate() {
            if fail_on == Some(n) {
                return Err(IncidentError::persistence(format!(
                    "injected failure creating incident for pivot {}",
                    draft.pivot_id
                )));
            }

            let incident = Incident {
                id: staged.next_incident_id,
                title: draft.title.clone(),
                district_id: draft.district_id,
                centroid_lat: draft.centroid.lat,
                centroid_lon: draft.centroid.lon,
                status: IncidentStatus::Open,
                opened_at: linked_at,
            };
            staged.next_incident_id += 1;

            for link in &draft.members {
                if !linked.insert(link.complaint_id) {
                    return Err(IncidentError::persistence(format!(
                        "complaint {} linked twice in one batch",
                        link.complaint_id
                    )));
                }
                let complaint = staged
                    .complaints
                    .iter_mut()
                    .find(|c| c.id == link.complaint_id)
                    .ok_or_else(|| {
                        IncidentError::persistence(format!(
                            "complaint {} does not exist",
                            link.complaint_id
                        ))
                    })?;
                if let Some(existing) = complaint.incident_id {
                    return Err(IncidentError::persistence(format!(
                        "complaint {} is already linked to incident {existing}",
                        complaint.id
                    )));
                }
                complaint.incident_id = Some(incident.id);
                complaint.link_score = Some(link.link_score);
            }

            staged.incidents.push(incident.clone());
            created.push(incident);
        }

        *guard = staged;
        Ok(created)
    }
}
