// libs/appointment-cell/src/services/overview.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentQuery, AppointmentStatus, AppointmentSummary,
    DoctorDashboard, PatientOverview, Profile,
};
use crate::services::calendar::{shift_days, start_of_week, ClinicSchedule};
use crate::state::AppState;
use crate::store::SchedulingStore;

pub const DEFAULT_LIST_LIMIT: usize = 100;
pub const MAX_LIST_LIMIT: usize = 500;

const UNKNOWN_NAME: &str = "Unknown";

/// Read-only summaries for the doctor, patient and staff panels.
pub struct OverviewService {
    store: Arc<dyn SchedulingStore>,
    schedule: Arc<ClinicSchedule>,
}

impl OverviewService {
    pub fn new(state: &AppState) -> Self {
        Self::with_store(Arc::clone(&state.store), Arc::clone(&state.schedule))
    }

    pub fn with_store(store: Arc<dyn SchedulingStore>, schedule: Arc<ClinicSchedule>) -> Self {
        Self { store, schedule }
    }

    pub async fn doctor_dashboard(&self, doctor_id: Uuid, now: DateTime<Utc>) -> Result<DoctorDashboard, AppointmentError> {
        self.store
            .find_profile(doctor_id)
            .await?
            .filter(Profile::is_doctor)
            .ok_or_else(|| AppointmentError::NotFound("Doctor".to_string()))?;

        let today = self.schedule.today(now);
        let today_window = self.schedule.days_window(today, today);
        let monday = start_of_week(today)?;
        let week_window = self.schedule.days_window(monday, shift_days(monday, 6)?);

        let todays_query = AppointmentQuery {
            doctor_id: Some(doctor_id),
            from: Some(today_window.start),
            until: Some(today_window.end),
            ..Default::default()
        };
        let week_query = AppointmentQuery {
            doctor_id: Some(doctor_id),
            from: Some(week_window.start),
            until: Some(week_window.end),
            ..Default::default()
        };
        let next_query = upcoming(AppointmentQuery { doctor_id: Some(doctor_id), ..Default::default() }, now);

        let (todays_appointments, week_appointments, next, total_patients) = futures::try_join!(
            self.store.query_appointments(&todays_query),
            self.store.query_appointments(&week_query),
            self.store.query_appointments(&next_query),
            self.store.distinct_patient_ids(doctor_id)
        )?;

        debug!("Dashboard for doctor {}: {} today, {} this week", doctor_id, todays_appointments.len(), week_appointments.len());

        Ok(DoctorDashboard {
            doctor_id,
            today,
            todays_appointments,
            next_appointment: next.into_iter().next(),
            week_appointment_count: week_appointments.len(),
            total_patients: total_patients.len(),
        })
    }

    /// Everyone the doctor has ever seen, ordered by last then first name.
    pub async fn doctor_patients(&self, doctor_id: Uuid) -> Result<Vec<Profile>, AppointmentError> {
        self.store
            .find_profile(doctor_id)
            .await?
            .filter(Profile::is_doctor)
            .ok_or_else(|| AppointmentError::NotFound("Doctor".to_string()))?;

        let patient_ids = self.store.distinct_patient_ids(doctor_id).await?;
        let mut patients = self.store.find_profiles(&patient_ids).await?;
        patients.sort_by(|a, b| {
            (a.last_name.as_str(), a.first_name.as_str()).cmp(&(b.last_name.as_str(), b.first_name.as_str()))
        });

        debug!("Doctor {} has {} patients", doctor_id, patients.len());
        Ok(patients)
    }

    pub async fn patient_overview(&self, patient_id: Uuid, now: DateTime<Utc>) -> Result<PatientOverview, AppointmentError> {
        let next_query = upcoming(AppointmentQuery { patient_id: Some(patient_id), ..Default::default() }, now);
        let past_query = AppointmentQuery {
            patient_id: Some(patient_id),
            until: Some(now),
            ..Default::default()
        };

        let (next, past) = futures::try_join!(
            self.store.query_appointments(&next_query),
            self.store.query_appointments(&past_query)
        )?;

        Ok(PatientOverview {
            patient_id,
            next_appointment: next.into_iter().next(),
            past_appointment_count: past.len(),
        })
    }

    /// Staff listing, newest first. `search` matches patient or doctor first/last names,
    /// ignoring case.
    pub async fn list_appointments(
        &self,
        status: Option<AppointmentStatus>,
        search: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<AppointmentSummary>, AppointmentError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let search = search.map(str::trim).filter(|term| !term.is_empty());

        // Names live on profiles, so a search first narrows to matching people.
        let participants = match search {
            Some(term) => {
                let ids = self.store.search_profile_ids(term).await?;
                if ids.is_empty() {
                    debug!("No profiles match '{}'", term);
                    return Ok(vec![]);
                }
                Some(ids)
            }
            None => None,
        };

        let query = AppointmentQuery {
            status,
            participants,
            newest_first: true,
            limit: Some(limit),
            ..Default::default()
        };
        let appointments = self.store.query_appointments(&query).await?;

        let people: Vec<Uuid> = appointments
            .iter()
            .flat_map(|appointment| [appointment.patient_id, appointment.doctor_id])
            .collect();
        let profiles: HashMap<Uuid, Profile> = self
            .store
            .find_profiles(&people)
            .await?
            .into_iter()
            .map(|profile| (profile.id, profile))
            .collect();

        let summaries = appointments
            .into_iter()
            .map(|appointment| summarize(appointment, &profiles))
            .collect();

        Ok(summaries)
    }

    pub async fn list_doctors(&self) -> Result<Vec<Profile>, AppointmentError> {
        Ok(self.store.list_doctors().await?)
    }
}

fn upcoming(base: AppointmentQuery, now: DateTime<Utc>) -> AppointmentQuery {
    AppointmentQuery {
        status: Some(AppointmentStatus::Reserved),
        from: Some(now),
        limit: Some(1),
        ..base
    }
}

fn summarize(appointment: Appointment, profiles: &HashMap<Uuid, Profile>) -> AppointmentSummary {
    let name = |id: &Uuid| {
        profiles
            .get(id)
            .map(Profile::full_name)
            .unwrap_or_else(|| UNKNOWN_NAME.to_string())
    };

    AppointmentSummary {
        patient_name: name(&appointment.patient_id),
        doctor_name: name(&appointment.doctor_id),
        appointment,
    }
}
