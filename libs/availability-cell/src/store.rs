use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{AvailabilitySlot, RecurrenceDefinition, SessionType, SlotKey};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("slot already booked")]
    SlotTaken,

    #[error("record not found")]
    NotFound,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence for recurrence definitions. No business rules live here.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn insert(&self, definition: RecurrenceDefinition) -> Result<(), StoreError>;
    async fn update(&self, definition: RecurrenceDefinition) -> Result<(), StoreError>;
    async fn get(&self, id: Uuid) -> Result<RecurrenceDefinition, StoreError>;
    async fn active_for_therapist(
        &self,
        therapist_id: Uuid,
    ) -> Result<Vec<RecurrenceDefinition>, StoreError>;
}

/// Persistence for availability slots, keyed by
/// `(therapist, date, time, session_type)`. `book_exclusive` is the
/// uniqueness-constraint-backed insert that makes booking linearizable per
/// slot key; everything else is plain reads and writes.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Insert or refresh a slot. An existing row keeps its `booked` flag and
    /// identity; the recurrence tag is refreshed only when the incoming slot
    /// carries one. Returns true when a new row was created.
    async fn upsert(&self, slot: AvailabilitySlot) -> Result<bool, StoreError>;

    /// Delete the row at `key` if it exists and is unbooked. Returns whether
    /// a row was deleted.
    async fn delete_unbooked(&self, key: &SlotKey) -> Result<bool, StoreError>;

    /// Delete every unbooked row generated by the given recurrence.
    async fn delete_unbooked_for_recurrence(
        &self,
        therapist_id: Uuid,
        recurrence_id: Uuid,
    ) -> Result<usize, StoreError>;

    /// All slots for a therapist, optionally from a date onward, ordered by
    /// (date, time, session type).
    async fn find(
        &self,
        therapist_id: Uuid,
        from: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilitySlot>, StoreError>;

    async fn find_by_key(&self, key: &SlotKey) -> Result<Option<AvailabilitySlot>, StoreError>;

    /// Atomically claim `(therapist, date, time)`. Fails with `SlotTaken`
    /// when any booked row exists at that date/time regardless of session
    /// type; otherwise marks the matching row booked, inserting an untagged
    /// row when the time was never exposed as availability.
    async fn book_exclusive(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        session_type: SessionType,
    ) -> Result<AvailabilitySlot, StoreError>;

    /// Flip booked rows at `(therapist, date, time)` back to bookable.
    /// Returns the number of rows released.
    async fn release(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<usize, StoreError>;
}

#[derive(Default)]
pub struct InMemoryScheduleStore {
    definitions: RwLock<HashMap<Uuid, RecurrenceDefinition>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert(&self, definition: RecurrenceDefinition) -> Result<(), StoreError> {
        self.definitions
            .write()
            .await
            .insert(definition.id, definition);
        Ok(())
    }

    async fn update(&self, definition: RecurrenceDefinition) -> Result<(), StoreError> {
        let mut definitions = self.definitions.write().await;
        if !definitions.contains_key(&definition.id) {
            return Err(StoreError::NotFound);
        }
        definitions.insert(definition.id, definition);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<RecurrenceDefinition, StoreError> {
        self.definitions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn active_for_therapist(
        &self,
        therapist_id: Uuid,
    ) -> Result<Vec<RecurrenceDefinition>, StoreError> {
        let definitions = self.definitions.read().await;
        let mut active: Vec<RecurrenceDefinition> = definitions
            .values()
            .filter(|d| d.therapist_id == therapist_id && d.active)
            .cloned()
            .collect();
        active.sort_by_key(|d| d.created_at);
        Ok(active)
    }
}

/// In-memory slot table. The write lock around `book_exclusive` plays the
/// role a uniqueness constraint plays in a SQL backend: two concurrent
/// claims of the same (therapist, date, time) serialize, and the loser sees
/// `SlotTaken`.
#[derive(Default)]
pub struct InMemorySlotStore {
    slots: RwLock<HashMap<SlotKey, AvailabilitySlot>>,
}

impl InMemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn upsert(&self, slot: AvailabilitySlot) -> Result<bool, StoreError> {
        let mut slots = self.slots.write().await;
        let key = slot.key();
        match slots.get_mut(&key) {
            Some(existing) => {
                if slot.recurrence_id.is_some() {
                    existing.recurrence_id = slot.recurrence_id;
                }
                Ok(false)
            }
            None => {
                slots.insert(key, slot);
                Ok(true)
            }
        }
    }

    async fn delete_unbooked(&self, key: &SlotKey) -> Result<bool, StoreError> {
        let mut slots = self.slots.write().await;
        match slots.get(key) {
            Some(slot) if !slot.booked => {
                slots.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_unbooked_for_recurrence(
        &self,
        therapist_id: Uuid,
        recurrence_id: Uuid,
    ) -> Result<usize, StoreError> {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| {
            !(slot.therapist_id == therapist_id
                && slot.recurrence_id == Some(recurrence_id)
                && !slot.booked)
        });
        Ok(before - slots.len())
    }

    async fn find(
        &self,
        therapist_id: Uuid,
        from: Option<NaiveDate>,
    ) -> Result<Vec<AvailabilitySlot>, StoreError> {
        let slots = self.slots.read().await;
        let mut found: Vec<AvailabilitySlot> = slots
            .values()
            .filter(|slot| {
                slot.therapist_id == therapist_id
                    && from.map(|d| slot.date >= d).unwrap_or(true)
            })
            .cloned()
            .collect();
        found.sort_by_key(|slot| (slot.date, slot.time, slot.session_type));
        Ok(found)
    }

    async fn find_by_key(&self, key: &SlotKey) -> Result<Option<AvailabilitySlot>, StoreError> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn book_exclusive(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        session_type: SessionType,
    ) -> Result<AvailabilitySlot, StoreError> {
        let mut slots = self.slots.write().await;

        let taken = slots.values().any(|slot| {
            slot.therapist_id == therapist_id
                && slot.date == date
                && slot.time == time
                && slot.booked
        });
        if taken {
            return Err(StoreError::SlotTaken);
        }

        let key = SlotKey {
            therapist_id,
            date,
            time,
            session_type,
        };
        let slot = slots.entry(key).or_insert_with(|| AvailabilitySlot {
            id: Uuid::new_v4(),
            therapist_id,
            date,
            time,
            session_type,
            booked: false,
            recurrence_id: None,
            created_at: Utc::now(),
        });
        slot.booked = true;
        Ok(slot.clone())
    }

    async fn release(
        &self,
        therapist_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<usize, StoreError> {
        let mut slots = self.slots.write().await;
        let mut released = 0;
        for slot in slots.values_mut() {
            if slot.therapist_id == therapist_id
                && slot.date == date
                && slot.time == time
                && slot.booked
            {
                slot.booked = false;
                released += 1;
            }
        }
        Ok(released)
    }
}
