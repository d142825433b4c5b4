// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, BookSlotRequest, NewAppointment, Profile,
    Requester,
};
use crate::services::calendar::require_whole_seconds;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::state::AppState;
use crate::store::SchedulingStore;

pub struct BookingService {
    store: Arc<dyn SchedulingStore>,
    lifecycle_service: AppointmentLifecycleService,
}

impl BookingService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>) -> Self {
        Self {
            store,
            lifecycle_service: AppointmentLifecycleService::new(),
        }
    }

    /// Reserve `(doctor, slot_time)` for a patient and return the new appointment id.
    ///
    /// The free-slot check only produces an early, friendly answer. Two callers can both
    /// pass it; the store's unique index decides which insert wins and the loser gets
    /// `SlotUnavailable`.
    pub async fn book_slot(&self, request: BookSlotRequest) -> Result<Uuid, AppointmentError> {
        debug!(
            "Booking doctor {} at {} for patient {}",
            request.doctor_id, request.slot_time, request.patient_id
        );
        require_whole_seconds(request.slot_time)?;

        self.store
            .find_profile(request.doctor_id)
            .await?
            .filter(Profile::is_doctor)
            .ok_or_else(|| AppointmentError::NotFound("Doctor".to_string()))?;

        self.store
            .find_specialty(request.specialty_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Specialty".to_string()))?;

        if self.store.slot_taken(request.doctor_id, request.slot_time).await? {
            warn!("Slot {} already taken for doctor {}", request.slot_time, request.doctor_id);
            return Err(AppointmentError::SlotUnavailable);
        }

        let appointment = self
            .store
            .insert_appointment(NewAppointment {
                patient_id: request.patient_id,
                doctor_id: request.doctor_id,
                specialty_id: request.specialty_id,
                slot_time: request.slot_time,
                reason: request.reason.unwrap_or_default(),
            })
            .await
            .map_err(|err| {
                warn!("Insert rejected for doctor {} at {}: {}", request.doctor_id, request.slot_time, err);
                AppointmentError::from(err)
            })?;

        info!("Appointment {} reserved", appointment.id);
        Ok(appointment.id)
    }

    /// Cancel a future reservation. Appointments the requester may not see are reported missing.
    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !requester.is_staff() && appointment.patient_id != requester.id {
            warn!("User {} attempted to cancel appointment {} they do not own", requester.id, appointment_id);
            return Err(AppointmentError::NotFound("Appointment".to_string()));
        }

        self.lifecycle_service.validate_cancellation(&appointment, now)?;
        let cancelled = self.transition(&appointment, AppointmentStatus::Cancelled, now).await?;

        info!("Appointment {} cancelled by {}", appointment_id, requester.id);
        Ok(cancelled)
    }

    /// Mark a reservation as attended. Only the appointment's doctor or staff may do this.
    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        requester: &Requester,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;
        if !requester.is_staff() && appointment.doctor_id != requester.id {
            return Err(AppointmentError::Unauthorized(
                "Only the attending doctor or staff can complete an appointment".to_string(),
            ));
        }

        self.lifecycle_service
            .validate_status_transition(appointment.status, AppointmentStatus::Completed)?;
        let completed = self.transition(&appointment, AppointmentStatus::Completed, Utc::now()).await?;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .find_appointment(appointment_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Appointment".to_string()))
    }

    /// Compare-and-set from the status we validated against. A concurrent writer that got
    /// there first turns this into `InvalidTransition` from whatever it wrote.
    async fn transition(
        &self,
        appointment: &Appointment,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        if let Some(updated) = self
            .store
            .transition_status(appointment.id, appointment.status, to, at)
            .await?
        {
            return Ok(updated);
        }

        let current = self.load(appointment.id).await?;
        warn!(
            "Lost status race on appointment {}: now {}, wanted {}",
            appointment.id, current.status, to
        );
        Err(AppointmentError::InvalidTransition { from: current.status, to })
    }
}
