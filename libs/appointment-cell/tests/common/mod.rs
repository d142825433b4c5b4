#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::Santiago;
use uuid::Uuid;

use appointment_cell::models::{
    Appointment, AppointmentQuery, AppointmentStatus, Blackout, BookSlotRequest, NewAppointment,
    Profile, Specialty, TimeWindow,
};
use appointment_cell::services::ClinicSchedule;
use appointment_cell::store::{InMemoryStore, SchedulingStore, StoreResult};
use shared_models::auth::Role;

/// Monday 2024-06-10. Santiago is on UTC-4 in June, so 10:00 local is 14:00Z.
pub fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 10).unwrap()
}

pub fn instant(raw: &str) -> DateTime<Utc> {
    raw.parse().unwrap()
}

pub fn schedule() -> Arc<ClinicSchedule> {
    Arc::new(ClinicSchedule::new(Santiago, 10, 16).unwrap())
}

pub fn profile(id: Uuid, first_name: &str, last_name: &str, role: Role, specialty_id: Option<Uuid>) -> Profile {
    Profile {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        role,
        specialty_id,
    }
}

/// A cardiology department with two doctors, a dermatologist and two patients.
pub struct Clinic {
    pub store: Arc<InMemoryStore>,
    pub schedule: Arc<ClinicSchedule>,
    pub cardiology: Uuid,
    pub dermatology: Uuid,
    pub doctor: Profile,
    pub colleague: Profile,
    pub dermatologist: Profile,
    pub patient: Profile,
    pub other_patient: Profile,
    pub admin: Profile,
}

impl Clinic {
    pub async fn seed() -> Self {
        Self::seed_into(Arc::new(InMemoryStore::new())).await
    }

    pub async fn seed_into(store: Arc<InMemoryStore>) -> Self {
        let cardiology = Uuid::new_v4();
        let dermatology = Uuid::new_v4();

        let doctor = profile(Uuid::new_v4(), "Bruno", "Araya", Role::Medico, Some(cardiology));
        let colleague = profile(Uuid::new_v4(), "Ana", "Soto", Role::Medico, Some(cardiology));
        let dermatologist = profile(Uuid::new_v4(), "Carla", "Munoz", Role::Medico, Some(dermatology));
        let patient = profile(Uuid::new_v4(), "Diego", "Rojas", Role::Usuario, None);
        let other_patient = profile(Uuid::new_v4(), "Elena", "Vidal", Role::Usuario, None);
        let admin = profile(Uuid::new_v4(), "Fabiola", "Perez", Role::Admin, None);

        for specialty in [(cardiology, "Cardiology"), (dermatology, "Dermatology")] {
            store
                .upsert_specialty(Specialty { id: specialty.0, name: specialty.1.to_string(), description: None })
                .await;
        }
        for person in [&doctor, &colleague, &dermatologist, &patient, &other_patient, &admin] {
            store.upsert_profile(person.clone()).await;
        }

        Self {
            store,
            schedule: schedule(),
            cardiology,
            dermatology,
            doctor,
            colleague,
            dermatologist,
            patient,
            other_patient,
            admin,
        }
    }

    pub fn dyn_store(&self) -> Arc<dyn SchedulingStore> {
        self.store.clone()
    }

    pub fn booking(&self, patient_id: Uuid, doctor_id: Uuid, slot_time: DateTime<Utc>) -> BookSlotRequest {
        BookSlotRequest {
            patient_id,
            doctor_id,
            specialty_id: self.cardiology,
            slot_time,
            reason: Some("Chest pain".to_string()),
        }
    }
}

/// Delegating store that counts window reads and can pretend every slot is free,
/// which simulates a pre-check that raced with another writer.
pub struct InstrumentedStore {
    pub inner: Arc<InMemoryStore>,
    pub stale_precheck: bool,
    window_reads: AtomicUsize,
}

impl InstrumentedStore {
    pub fn new(inner: Arc<InMemoryStore>, stale_precheck: bool) -> Self {
        Self { inner, stale_precheck, window_reads: AtomicUsize::new(0) }
    }

    pub fn window_reads(&self) -> usize {
        self.window_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchedulingStore for InstrumentedStore {
    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        self.inner.find_profile(id).await
    }

    async fn find_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        self.inner.find_profiles(ids).await
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Profile>> {
        self.inner.list_doctors().await
    }

    async fn doctors_by_specialty(&self, specialty_id: Uuid) -> StoreResult<Vec<Profile>> {
        self.inner.doctors_by_specialty(specialty_id).await
    }

    async fn find_specialty(&self, id: Uuid) -> StoreResult<Option<Specialty>> {
        self.inner.find_specialty(id).await
    }

    async fn search_profile_ids(&self, term: &str) -> StoreResult<Vec<Uuid>> {
        self.inner.search_profile_ids(term).await
    }

    async fn reserved_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Appointment>> {
        self.window_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.reserved_in_window(doctor_ids, window).await
    }

    async fn blackouts_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Blackout>> {
        self.window_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.blackouts_in_window(doctor_ids, window).await
    }

    async fn slot_taken(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        if self.stale_precheck {
            return Ok(false);
        }
        self.inner.slot_taken(doctor_id, slot_time).await
    }

    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        self.inner.insert_appointment(new).await
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        self.inner.find_appointment(id).await
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>> {
        self.inner.transition_status(id, from, to, at).await
    }

    async fn query_appointments(&self, query: &AppointmentQuery) -> StoreResult<Vec<Appointment>> {
        self.inner.query_appointments(query).await
    }

    async fn distinct_patient_ids(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>> {
        self.inner.distinct_patient_ids(doctor_id).await
    }

    async fn insert_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.insert_blackout(doctor_id, slot_time).await
    }

    async fn delete_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        self.inner.delete_blackout(doctor_id, slot_time).await
    }
}
