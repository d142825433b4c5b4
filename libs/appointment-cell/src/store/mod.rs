// libs/appointment-cell/src/store/mod.rs
//! Persistence seam for the scheduling core.
//!
//! Both implementations enforce the unique `(doctor_id, slot_time)` keys on
//! appointments and blackouts inside the store itself; a losing concurrent writer
//! receives `StoreError::UniqueViolation`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, Blackout,
    NewAppointment, Profile, Specialty, TimeWindow,
};

pub mod memory;
pub mod supabase;

pub use memory::InMemoryStore;
pub use supabase::SupabaseStore;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Unique constraint violated on (doctor_id, slot_time)")]
    UniqueViolation,

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        if err.is_unique_violation() {
            StoreError::UniqueViolation
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation => AppointmentError::SlotUnavailable,
            StoreError::Backend(msg) => AppointmentError::DatabaseError(msg),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait SchedulingStore: Send + Sync {
    // Directory reads

    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>>;

    async fn find_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>>;

    /// Every profile with the `MEDICO` role, ordered by last then first name.
    async fn list_doctors(&self) -> StoreResult<Vec<Profile>>;

    async fn doctors_by_specialty(&self, specialty_id: Uuid) -> StoreResult<Vec<Profile>>;

    async fn find_specialty(&self, id: Uuid) -> StoreResult<Option<Specialty>>;

    /// Ids of profiles whose first or last name contains `term`, ignoring case.
    async fn search_profile_ids(&self, term: &str) -> StoreResult<Vec<Uuid>>;

    // Window reads

    async fn reserved_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Appointment>>;

    async fn blackouts_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Blackout>>;

    /// True if any appointment (whatever its status) or blackout holds the key.
    async fn slot_taken(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool>;

    // Appointments

    /// Atomic insert guarded by the unique `(doctor_id, slot_time)` index.
    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment>;

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>>;

    /// Compare-and-set on status. `None` when the row is missing or no longer in `from`.
    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>>;

    async fn query_appointments(&self, query: &AppointmentQuery) -> StoreResult<Vec<Appointment>>;

    /// Every patient who ever held an appointment with the doctor, without repeats.
    async fn distinct_patient_ids(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>>;

    // Blackouts

    /// Returns `true` if a row was created, `false` if the key was already blocked.
    async fn insert_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool>;

    /// Returns `true` if a row was removed.
    async fn delete_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool>;
}
