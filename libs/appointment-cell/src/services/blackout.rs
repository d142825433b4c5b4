// libs/appointment-cell/src/services/blackout.rs
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{AppointmentError, BlackoutChange, Profile};
use crate::services::calendar::require_whole_seconds;
use crate::state::AppState;
use crate::store::SchedulingStore;

pub struct BlackoutService {
    store: Arc<dyn SchedulingStore>,
}

impl BlackoutService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>) -> Self {
        Self { store }
    }

    /// Idempotently block or unblock one slot of a doctor's calendar.
    ///
    /// Existing reservations on the same slot are left alone; the reservation still
    /// wins when the grid is resolved.
    pub async fn set_blackout(
        &self,
        doctor_id: Uuid,
        slot_time: DateTime<Utc>,
        blocked: bool,
    ) -> Result<BlackoutChange, AppointmentError> {
        let slot_time = require_whole_seconds(slot_time)?;
        self.store
            .find_profile(doctor_id)
            .await?
            .filter(Profile::is_doctor)
            .ok_or_else(|| AppointmentError::NotFound("Doctor".to_string()))?;

        let change = if blocked {
            if self.store.insert_blackout(doctor_id, slot_time).await? {
                BlackoutChange::Created
            } else {
                BlackoutChange::AlreadyBlocked
            }
        } else if self.store.delete_blackout(doctor_id, slot_time).await? {
            BlackoutChange::Removed
        } else {
            BlackoutChange::NotBlocked
        };

        match change {
            BlackoutChange::Created | BlackoutChange::Removed => {
                info!("Blackout {:?} for doctor {} at {}", change, doctor_id, slot_time)
            }
            _ => debug!("Blackout unchanged ({:?}) for doctor {} at {}", change, doctor_id, slot_time),
        }

        Ok(change)
    }
}
