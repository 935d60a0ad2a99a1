use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use availability_cell::store::StoreError;

use crate::models::{Appointment, AppointmentStatus, CareRelationship};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(&self, appointment: Appointment) -> Result<(), StoreError>;
    async fn update(&self, appointment: Appointment) -> Result<(), StoreError>;
    async fn get(&self, id: Uuid) -> Result<Appointment, StoreError>;
    /// A client's appointments, newest date first.
    async fn for_client(&self, client_id: Uuid) -> Result<Vec<Appointment>, StoreError>;
    /// A therapist's appointments, newest date first.
    async fn for_therapist(&self, therapist_id: Uuid) -> Result<Vec<Appointment>, StoreError>;
}

/// Care relationships between clients and therapists.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Record the pair as ongoing. Calling again for an existing pair is a
    /// no-op.
    async fn ensure_ongoing(&self, therapist_id: Uuid, client_id: Uuid) -> Result<(), StoreError>;
    async fn exists(&self, therapist_id: Uuid, client_id: Uuid) -> Result<bool, StoreError>;
}

/// Profile collaborator seam: the one fact booking needs from the therapist
/// profile is the current session fee.
#[async_trait]
pub trait TherapistDirectory: Send + Sync {
    async fn current_fee(&self, therapist_id: Uuid) -> Result<f64, StoreError>;
}

#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(&self, appointment: Appointment) -> Result<(), StoreError> {
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment);
        Ok(())
    }

    async fn update(&self, appointment: Appointment) -> Result<(), StoreError> {
        let mut appointments = self.appointments.write().await;
        if !appointments.contains_key(&appointment.id) {
            return Err(StoreError::NotFound);
        }
        appointments.insert(appointment.id, appointment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Appointment, StoreError> {
        self.appointments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn for_client(&self, client_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.client_id == client_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| std::cmp::Reverse((a.date, a.time_slot.start_time)));
        Ok(found)
    }

    async fn for_therapist(&self, therapist_id: Uuid) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.therapist_id == therapist_id)
            .cloned()
            .collect();
        found.sort_by_key(|a| std::cmp::Reverse((a.date, a.time_slot.start_time)));
        Ok(found)
    }
}

/// Convenience filter shared by the upcoming-list handlers.
pub fn upcoming_only(appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments
        .into_iter()
        .filter(|a| a.status == AppointmentStatus::Upcoming)
        .collect()
}

#[derive(Default)]
pub struct InMemoryRelationshipStore {
    relationships: RwLock<HashMap<(Uuid, Uuid), CareRelationship>>,
}

impl InMemoryRelationshipStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for InMemoryRelationshipStore {
    async fn ensure_ongoing(&self, therapist_id: Uuid, client_id: Uuid) -> Result<(), StoreError> {
        let mut relationships = self.relationships.write().await;
        relationships
            .entry((therapist_id, client_id))
            .or_insert_with(|| CareRelationship {
                therapist_id,
                client_id,
                status: "ongoing".to_string(),
                created_at: Utc::now(),
            });
        Ok(())
    }

    async fn exists(&self, therapist_id: Uuid, client_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .relationships
            .read()
            .await
            .contains_key(&(therapist_id, client_id)))
    }
}

/// In-memory fee directory keyed by therapist id, with a fallback default
/// for therapists without an explicit entry.
pub struct InMemoryTherapistDirectory {
    fees: RwLock<HashMap<Uuid, f64>>,
    default_fee: f64,
}

impl InMemoryTherapistDirectory {
    pub fn new(default_fee: f64) -> Self {
        Self {
            fees: RwLock::new(HashMap::new()),
            default_fee,
        }
    }

    pub async fn set_fee(&self, therapist_id: Uuid, fee: f64) {
        self.fees.write().await.insert(therapist_id, fee);
    }
}

#[async_trait]
impl TherapistDirectory for InMemoryTherapistDirectory {
    async fn current_fee(&self, therapist_id: Uuid) -> Result<f64, StoreError> {
        Ok(self
            .fees
            .read()
            .await
            .get(&therapist_id)
            .copied()
            .unwrap_or(self.default_fee))
    }
}
