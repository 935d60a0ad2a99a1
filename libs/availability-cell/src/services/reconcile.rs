use chrono::{NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_utils::slot_clock;

use crate::models::{
    AvailabilityError, AvailabilitySlot, AvailabilitySubmission, ReconcileSummary, SessionType,
};
use crate::store::SlotStore;

type DesiredState = BTreeMap<NaiveDate, BTreeMap<NaiveTime, BTreeSet<SessionType>>>;

/// Brings the slot table into agreement with a therapist's full desired-state
/// submission without ever discarding a booked slot. Idempotent, so a failed
/// run is safe to retry wholesale.
pub struct AvailabilityReconciler {
    slots: Arc<dyn SlotStore>,
}

impl AvailabilityReconciler {
    pub fn new(slots: Arc<dyn SlotStore>) -> Self {
        Self { slots }
    }

    pub async fn apply(
        &self,
        therapist_id: Uuid,
        submission: &AvailabilitySubmission,
    ) -> Result<ReconcileSummary, AvailabilityError> {
        // Parse every time string before touching the store, so malformed
        // input rejects the whole submission with no partial effect.
        let desired = parse_submission(submission)?;

        debug!(
            "Reconciling availability for therapist {} across {} submitted dates",
            therapist_id,
            desired.len()
        );

        let existing = self.slots.find(therapist_id, None).await?;
        let mut summary = ReconcileSummary::default();

        for slot in &existing {
            match desired.get(&slot.date) {
                // Date removed wholesale: unbooked slots go, booked slots
                // stay behind as orphaned commitments.
                None => {
                    if self.slots.delete_unbooked(&slot.key()).await? {
                        summary.deleted += 1;
                    }
                }
                Some(times) => {
                    let still_offered = times
                        .get(&slot.time)
                        .map(|types| types.contains(&slot.session_type))
                        .unwrap_or(false);
                    if !still_offered && self.slots.delete_unbooked(&slot.key()).await? {
                        summary.deleted += 1;
                    }
                }
            }
        }

        for (date, times) in &desired {
            for (time, types) in times {
                for session_type in types {
                    let created = self
                        .slots
                        .upsert(AvailabilitySlot {
                            id: Uuid::new_v4(),
                            therapist_id,
                            date: *date,
                            time: *time,
                            session_type: *session_type,
                            booked: false,
                            recurrence_id: None,
                            created_at: Utc::now(),
                        })
                        .await?;
                    if created {
                        summary.inserted += 1;
                    } else {
                        summary.kept += 1;
                    }
                }
            }
        }

        info!(
            "Availability reconciled for therapist {}: {} inserted, {} deleted, {} kept",
            therapist_id, summary.inserted, summary.deleted, summary.kept
        );
        Ok(summary)
    }
}

fn parse_submission(submission: &AvailabilitySubmission) -> Result<DesiredState, AvailabilityError> {
    let mut desired: DesiredState = BTreeMap::new();
    for (date, times) in submission {
        let day = desired.entry(*date).or_default();
        for (time_str, types) in times {
            let time = slot_clock::parse_time(time_str)?;
            day.entry(time).or_default().extend(types.iter().copied());
        }
    }
    Ok(desired)
}
