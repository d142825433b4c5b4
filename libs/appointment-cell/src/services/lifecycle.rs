// libs/appointment-cell/src/services/lifecycle.rs
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Reserved => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states never re-open
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Cancelling requires a reserved appointment whose slot is still strictly in the future.
    pub fn validate_cancellation(&self, appointment: &Appointment, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        self.validate_status_transition(appointment.status, AppointmentStatus::Cancelled)?;

        if now >= appointment.slot_time {
            warn!(
                "Refusing to cancel appointment {}: slot {} is not after {}",
                appointment.id, appointment.slot_time, now
            );
            return Err(AppointmentError::InvalidTransition {
                from: appointment.status,
                to: AppointmentStatus::Cancelled,
            });
        }

        Ok(())
    }
}
