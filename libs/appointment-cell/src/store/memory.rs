// libs/appointment-cell/src/store/memory.rs
use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, Blackout, NewAppointment, Profile,
    Specialty, TimeWindow,
};
use super::{SchedulingStore, StoreError, StoreResult};

type SlotKey = (Uuid, DateTime<Utc>);

#[derive(Default)]
struct Tables {
    profiles: HashMap<Uuid, Profile>,
    specialties: HashMap<Uuid, Specialty>,
    appointments: HashMap<Uuid, Appointment>,
    // Unique index; ordered so window reads are range scans per doctor.
    appointment_keys: BTreeMap<SlotKey, Uuid>,
    blackouts: BTreeMap<SlotKey, Blackout>,
}

/// Process-local store. Each call takes the lock once, so check-and-insert is atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_profile(&self, profile: Profile) {
        self.tables.write().await.profiles.insert(profile.id, profile);
    }

    pub async fn upsert_specialty(&self, specialty: Specialty) {
        self.tables.write().await.specialties.insert(specialty.id, specialty);
    }

    pub async fn appointment_count(&self) -> usize {
        self.tables.read().await.appointments.len()
    }

    pub async fn blackout_count(&self) -> usize {
        self.tables.read().await.blackouts.len()
    }
}

fn window_range(doctor_id: Uuid, window: TimeWindow) -> std::ops::Range<SlotKey> {
    (doctor_id, window.start)..(doctor_id, window.end.max(window.start))
}

fn sort_doctors(doctors: &mut [Profile]) {
    doctors.sort_by(|a, b| {
        (a.last_name.as_str(), a.first_name.as_str()).cmp(&(b.last_name.as_str(), b.first_name.as_str()))
    });
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&id).cloned())
    }

    async fn find_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().await;
        let unique: HashSet<&Uuid> = ids.iter().collect();
        Ok(unique.into_iter().filter_map(|id| tables.profiles.get(id).cloned()).collect())
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().await;
        let mut doctors: Vec<Profile> = tables.profiles.values().filter(|p| p.is_doctor()).cloned().collect();
        sort_doctors(&mut doctors);
        Ok(doctors)
    }

    async fn doctors_by_specialty(&self, specialty_id: Uuid) -> StoreResult<Vec<Profile>> {
        let tables = self.tables.read().await;
        let mut doctors: Vec<Profile> = tables
            .profiles
            .values()
            .filter(|p| p.is_doctor() && p.specialty_id == Some(specialty_id))
            .cloned()
            .collect();
        sort_doctors(&mut doctors);
        Ok(doctors)
    }

    async fn find_specialty(&self, id: Uuid) -> StoreResult<Option<Specialty>> {
        Ok(self.tables.read().await.specialties.get(&id).cloned())
    }

    async fn search_profile_ids(&self, term: &str) -> StoreResult<Vec<Uuid>> {
        let term = term.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .profiles
            .values()
            .filter(|p| p.first_name.to_lowercase().contains(&term) || p.last_name.to_lowercase().contains(&term))
            .map(|p| p.id)
            .collect())
    }

    async fn reserved_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let reserved = doctor_ids
            .iter()
            .flat_map(|doctor_id| tables.appointment_keys.range(window_range(*doctor_id, window)))
            .filter_map(|(_, id)| tables.appointments.get(id))
            .filter(|appointment| appointment.status == AppointmentStatus::Reserved)
            .cloned()
            .collect();
        Ok(reserved)
    }

    async fn blackouts_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Blackout>> {
        let tables = self.tables.read().await;
        let blackouts = doctor_ids
            .iter()
            .flat_map(|doctor_id| tables.blackouts.range(window_range(*doctor_id, window)))
            .map(|(_, blackout)| blackout.clone())
            .collect();
        Ok(blackouts)
    }

    async fn slot_taken(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        let tables = self.tables.read().await;
        let key = (doctor_id, slot_time);
        Ok(tables.appointment_keys.contains_key(&key) || tables.blackouts.contains_key(&key))
    }

    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let mut tables = self.tables.write().await;
        let key = (new.doctor_id, new.slot_time);
        if tables.appointment_keys.contains_key(&key) {
            debug!("Rejecting duplicate appointment key {:?}", key);
            return Err(StoreError::UniqueViolation);
        }

        let now = Utc::now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: new.patient_id,
            doctor_id: new.doctor_id,
            specialty_id: new.specialty_id,
            slot_time: new.slot_time,
            reason: new.reason,
            status: AppointmentStatus::Reserved,
            created_at: now,
            updated_at: now,
        };

        tables.appointment_keys.insert(key, appointment.id);
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        Ok(self.tables.read().await.appointments.get(&id).cloned())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>> {
        let mut tables = self.tables.write().await;
        match tables.appointments.get_mut(&id) {
            Some(appointment) if appointment.status == from => {
                appointment.status = to;
                appointment.updated_at = at;
                Ok(Some(appointment.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn query_appointments(&self, query: &AppointmentQuery) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.read().await;
        let mut matches: Vec<Appointment> = tables
            .appointments
            .values()
            .filter(|appointment| query.matches(appointment))
            .cloned()
            .collect();

        matches.sort_by_key(|appointment| appointment.slot_time);
        if query.newest_first {
            matches.reverse();
        }
        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }
        Ok(matches)
    }

    async fn distinct_patient_ids(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let tables = self.tables.read().await;
        let patients: HashSet<Uuid> = tables
            .appointments
            .values()
            .filter(|appointment| appointment.doctor_id == doctor_id)
            .map(|appointment| appointment.patient_id)
            .collect();
        Ok(patients.into_iter().collect())
    }

    async fn insert_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let key = (doctor_id, slot_time);
        if tables.blackouts.contains_key(&key) {
            return Ok(false);
        }
        tables.blackouts.insert(key, Blackout {
            id: Uuid::new_v4(),
            doctor_id,
            slot_time,
            created_at: Utc::now(),
        });
        Ok(true)
    }

    async fn delete_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self.tables.write().await.blackouts.remove(&(doctor_id, slot_time)).is_some())
    }
}
