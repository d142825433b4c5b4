// libs/appointment-cell/src/services/availability.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AvailableSlot, Blackout, DaySchedule, DoctorFilter, GridMode,
    Profile, ScheduleSlot, SlotState, WeeklySchedule,
};
use crate::services::calendar::{week_navigation, CalendarGrid, ClinicSchedule};
use crate::state::AppState;
use crate::store::SchedulingStore;

/// Reservations and blackouts for one bounded window, keyed by `(doctor, instant)`.
/// Built per request and dropped with it.
#[derive(Debug, Default)]
pub struct SlotLookup {
    reserved: HashMap<(Uuid, DateTime<Utc>), Appointment>,
    blocked: HashSet<(Uuid, DateTime<Utc>)>,
}

impl SlotLookup {
    pub fn new(reserved: Vec<Appointment>, blackouts: Vec<Blackout>) -> Self {
        Self {
            reserved: reserved
                .into_iter()
                .map(|appointment| ((appointment.doctor_id, appointment.slot_time), appointment))
                .collect(),
            blocked: blackouts
                .into_iter()
                .map(|blackout| (blackout.doctor_id, blackout.slot_time))
                .collect(),
        }
    }

    /// Reserved dominates blocked.
    pub fn classify(&self, doctor_id: Uuid, instant: DateTime<Utc>) -> SlotState {
        let key = (doctor_id, instant);
        if let Some(appointment) = self.reserved.get(&key) {
            return SlotState::Reserved {
                appointment_id: appointment.id,
                patient_id: appointment.patient_id,
                reason: appointment.reason.clone(),
            };
        }
        if self.blocked.contains(&key) {
            SlotState::Blocked
        } else {
            SlotState::Available
        }
    }
}

pub struct AvailabilityService {
    store: Arc<dyn SchedulingStore>,
    schedule: Arc<ClinicSchedule>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), Arc::clone(&state.schedule))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>, schedule: Arc<ClinicSchedule>) -> Self {
        Self { store, schedule }
    }

    /// Monday-to-Friday grid for one doctor with every slot classified.
    pub async fn week_grid(&self, anchor: NaiveDate, doctor_id: Uuid) -> Result<WeeklySchedule, AppointmentError> {
        let (start_of_week, previous_week, next_week) = week_navigation(anchor)?;
        let doctor = self.require_doctor(doctor_id).await?;
        let grid = self.schedule.grid(anchor, GridMode::WorkWeek)?;
        let lookup = self.resolve(&grid, &[doctor_id]).await?;

        let days = grid
            .days()
            .iter()
            .map(|day| DaySchedule {
                date: *day,
                slots: grid
                    .slots_on(*day)
                    .map(|slot| ScheduleSlot {
                        slot_time: slot.instant,
                        local_time: slot.local_time,
                        state: lookup.classify(doctor_id, slot.instant),
                    })
                    .collect(),
            })
            .collect();

        debug!("Week grid for doctor {} starting {}", doctor_id, start_of_week);

        Ok(WeeklySchedule {
            doctor_id,
            doctor_name: doctor.full_name(),
            start_of_week,
            previous_week,
            next_week,
            business_hours: self.schedule.business_hours().to_vec(),
            days,
        })
    }

    /// Free slots on one day across a specialty's doctors, optionally narrowed to one doctor.
    pub async fn day_availability(
        &self,
        specialty_id: Uuid,
        date: NaiveDate,
        filter: DoctorFilter,
    ) -> Result<Vec<AvailableSlot>, AppointmentError> {
        self.store
            .find_specialty(specialty_id)
            .await?
            .ok_or_else(|| AppointmentError::NotFound("Specialty".to_string()))?;

        let mut doctors = self.store.doctors_by_specialty(specialty_id).await?;
        if let DoctorFilter::Doctor(doctor_id) = filter {
            doctors.retain(|doctor| doctor.id == doctor_id);
        }

        let grid = self.schedule.grid(date, GridMode::Day)?;
        let doctor_ids: Vec<Uuid> = doctors.iter().map(|doctor| doctor.id).collect();
        let lookup = self.resolve(&grid, &doctor_ids).await?;

        let mut available: Vec<AvailableSlot> = grid
            .iter()
            .flat_map(|slot| {
                let lookup = &lookup;
                doctors.iter().filter_map(move |doctor| {
                    matches!(lookup.classify(doctor.id, slot.instant), SlotState::Available).then(|| AvailableSlot {
                        doctor_id: doctor.id,
                        doctor_name: doctor.full_name(),
                        slot_time: slot.instant,
                        local_time: slot.local_time,
                    })
                })
            })
            .collect();

        available.sort_by(|a, b| (a.slot_time, &a.doctor_name).cmp(&(b.slot_time, &b.doctor_name)));

        info!(
            "{} available slots for specialty {} on {} across {} doctors",
            available.len(), specialty_id, date, doctors.len()
        );
        Ok(available)
    }

    /// Two bounded reads over the grid's window. Empty grids and empty doctor sets skip the store.
    async fn resolve(&self, grid: &CalendarGrid<'_>, doctor_ids: &[Uuid]) -> Result<SlotLookup, AppointmentError> {
        let window = match grid.window() {
            Some(window) if !doctor_ids.is_empty() => window,
            _ => return Ok(SlotLookup::default()),
        };

        let (reserved, blackouts) = futures::try_join!(
            self.store.reserved_in_window(doctor_ids, window),
            self.store.blackouts_in_window(doctor_ids, window)
        )?;

        debug!(
            "Resolved {} reservations and {} blackouts in [{}, {})",
            reserved.len(), blackouts.len(), window.start, window.end
        );
        Ok(SlotLookup::new(reserved, blackouts))
    }

    async fn require_doctor(&self, doctor_id: Uuid) -> Result<Profile, AppointmentError> {
        self.store
            .find_profile(doctor_id)
            .await?
            .filter(Profile::is_doctor)
            .ok_or_else(|| AppointmentError::NotFound("Doctor".to_string()))
    }
}
