use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use shared_utils::slot_clock;

use crate::models::{
    AvailabilityError, AvailabilitySlot, BreakWindow, BreakWindowRequest,
    CreateRecurringScheduleRequest, RecurrenceDefinition, UpdateRecurringScheduleRequest,
};
use crate::services::recurrence;
use crate::store::{ScheduleStore, SlotStore};

/// Owns recurrence definitions: creation supersedes overlapping patterns,
/// expansion populates the slot table, and removal is always soft. A
/// recurrence is a generator, not the source of truth for existing
/// commitments, so booked slots are never touched from here.
pub struct RecurringScheduleService {
    schedules: Arc<dyn ScheduleStore>,
    slots: Arc<dyn SlotStore>,
}

impl RecurringScheduleService {
    pub fn new(schedules: Arc<dyn ScheduleStore>, slots: Arc<dyn SlotStore>) -> Self {
        Self { schedules, slots }
    }

    pub async fn create(
        &self,
        therapist_id: Uuid,
        request: CreateRecurringScheduleRequest,
    ) -> Result<(RecurrenceDefinition, usize), AvailabilityError> {
        debug!("Creating recurring schedule for therapist {}", therapist_id);

        let now = Utc::now();
        let definition = RecurrenceDefinition {
            id: Uuid::new_v4(),
            therapist_id,
            label: request.label,
            days: request.days,
            start_time: slot_clock::parse_time(&request.start_time)?,
            end_time: slot_clock::parse_time(&request.end_time)?,
            interval_minutes: request.interval_minutes,
            session_types: request.session_types,
            breaks: parse_breaks(&request.breaks)?,
            start_date: request.start_date,
            end_date: request.end_date,
            active: true,
            created_at: now,
            updated_at: now,
        };
        recurrence::validate(&definition)?;

        self.deactivate_overlapping(&definition, None).await?;
        self.schedules.insert(definition.clone()).await?;
        let generated = self.populate_slots(&definition).await?;

        info!(
            "Recurring schedule {} created for therapist {} ({} slots generated)",
            definition.id, therapist_id, generated
        );
        Ok((definition, generated))
    }

    pub async fn update(
        &self,
        id: Uuid,
        therapist_id: Uuid,
        patch: UpdateRecurringScheduleRequest,
    ) -> Result<(RecurrenceDefinition, usize), AvailabilityError> {
        debug!("Updating recurring schedule {}", id);

        let mut definition = self.schedules.get(id).await?;
        if definition.therapist_id != therapist_id {
            return Err(AvailabilityError::Unauthorized);
        }

        if let Some(label) = patch.label {
            definition.label = Some(label);
        }
        if let Some(days) = patch.days {
            definition.days = days;
        }
        if let Some(start_time) = patch.start_time {
            definition.start_time = slot_clock::parse_time(&start_time)?;
        }
        if let Some(end_time) = patch.end_time {
            definition.end_time = slot_clock::parse_time(&end_time)?;
        }
        if let Some(interval) = patch.interval_minutes {
            definition.interval_minutes = interval;
        }
        if let Some(session_types) = patch.session_types {
            definition.session_types = session_types;
        }
        if let Some(breaks) = patch.breaks {
            definition.breaks = parse_breaks(&breaks)?;
        }
        if let Some(start_date) = patch.start_date {
            definition.start_date = start_date;
        }
        if let Some(end_date) = patch.end_date {
            definition.end_date = end_date;
        }
        definition.active = true;
        definition.updated_at = Utc::now();

        recurrence::validate(&definition)?;

        // Regenerate from scratch: drop what this definition previously
        // produced (booked slots stay), supersede any other overlap, re-expand.
        self.slots
            .delete_unbooked_for_recurrence(therapist_id, id)
            .await?;
        self.deactivate_overlapping(&definition, Some(id)).await?;
        self.schedules.update(definition.clone()).await?;
        let generated = self.populate_slots(&definition).await?;

        info!(
            "Recurring schedule {} updated ({} slots regenerated)",
            id, generated
        );
        Ok((definition, generated))
    }

    /// Soft delete: the definition is deactivated and only its unbooked
    /// generated slots are removed.
    pub async fn delete(&self, id: Uuid, therapist_id: Uuid) -> Result<usize, AvailabilityError> {
        let mut definition = self.schedules.get(id).await?;
        if definition.therapist_id != therapist_id {
            return Err(AvailabilityError::Unauthorized);
        }

        definition.active = false;
        definition.updated_at = Utc::now();
        self.schedules.update(definition).await?;

        let removed = self
            .slots
            .delete_unbooked_for_recurrence(therapist_id, id)
            .await?;
        info!(
            "Recurring schedule {} deactivated ({} unbooked slots removed)",
            id, removed
        );
        Ok(removed)
    }

    pub async fn list(
        &self,
        therapist_id: Uuid,
    ) -> Result<Vec<RecurrenceDefinition>, AvailabilityError> {
        Ok(self.schedules.active_for_therapist(therapist_id).await?)
    }

    /// Deactivate every active definition for the same therapist that shares
    /// a weekday with `definition` and intersects its time window, removing
    /// the superseded definition's unbooked slots.
    async fn deactivate_overlapping(
        &self,
        definition: &RecurrenceDefinition,
        exclude_id: Option<Uuid>,
    ) -> Result<(), AvailabilityError> {
        let active = self
            .schedules
            .active_for_therapist(definition.therapist_id)
            .await?;

        for mut other in active {
            if Some(other.id) == exclude_id || other.id == definition.id {
                continue;
            }
            let shares_day = other.days.iter().any(|d| definition.days.contains(d));
            if !shares_day {
                continue;
            }
            if !recurrence::windows_overlap(
                definition.start_time,
                definition.end_time,
                other.start_time,
                other.end_time,
            ) {
                continue;
            }

            other.active = false;
            other.updated_at = Utc::now();
            let superseded_id = other.id;
            self.schedules.update(other).await?;
            let removed = self
                .slots
                .delete_unbooked_for_recurrence(definition.therapist_id, superseded_id)
                .await?;
            info!(
                "Recurring schedule {} superseded by overlapping schedule for therapist {} ({} unbooked slots removed)",
                superseded_id, definition.therapist_id, removed
            );
        }

        Ok(())
    }

    async fn populate_slots(
        &self,
        definition: &RecurrenceDefinition,
    ) -> Result<usize, AvailabilityError> {
        let mut inserted = 0;
        for candidate in recurrence::expand(definition) {
            let created = self
                .slots
                .upsert(AvailabilitySlot {
                    id: Uuid::new_v4(),
                    therapist_id: definition.therapist_id,
                    date: candidate.date,
                    time: candidate.time,
                    session_type: candidate.session_type,
                    booked: false,
                    recurrence_id: Some(definition.id),
                    created_at: Utc::now(),
                })
                .await?;
            if created {
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

fn parse_breaks(requests: &[BreakWindowRequest]) -> Result<Vec<BreakWindow>, AvailabilityError> {
    requests
        .iter()
        .map(|brk| {
            Ok(BreakWindow {
                start_time: slot_clock::parse_time(&brk.start_time)?,
                end_time: slot_clock::parse_time(&brk.end_time)?,
                label: brk.label.clone(),
            })
        })
        .collect()
}
