// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate, NaiveTime};
use std::fmt;
use std::str::FromStr;

use shared_models::auth::Role;
use shared_models::error::AppError;

// ==============================================================================
// DIRECTORY MODELS (owned by the identity collaborator, read-only here)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub specialty_id: Option<Uuid>,
}

impl Profile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Medico
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Specialty {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// An already-authenticated caller acting on the scheduling core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub id: Uuid,
    pub role: Role,
}

impl Requester {
    pub fn new(id: Uuid, role: Role) -> Self {
        Self { id, role }
    }

    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub slot_time: DateTime<Utc>,
    #[serde(default)]
    pub reason: String,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Reserved,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Completed | AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Reserved => write!(f, "RESERVED"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RESERVED" => Ok(AppointmentStatus::Reserved),
            "COMPLETED" => Ok(AppointmentStatus::Completed),
            "CANCELLED" => Ok(AppointmentStatus::Cancelled),
            other => Err(AppointmentError::ValidationError(format!("Unknown appointment status '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub slot_time: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Blackout {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub slot_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

// ==============================================================================
// SCHEDULE VIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridMode {
    Day,
    WorkWeek,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotState {
    Available,
    Reserved {
        appointment_id: Uuid,
        patient_id: Uuid,
        reason: String,
    },
    Blocked,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSlot {
    pub slot_time: DateTime<Utc>,
    pub local_time: NaiveTime,
    #[serde(flatten)]
    pub state: SlotState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub slots: Vec<ScheduleSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklySchedule {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub start_of_week: NaiveDate,
    pub previous_week: NaiveDate,
    pub next_week: NaiveDate,
    pub business_hours: Vec<NaiveTime>,
    pub days: Vec<DaySchedule>,
}

impl WeeklySchedule {
    pub fn slots(&self) -> impl Iterator<Item = &ScheduleSlot> {
        self.days.iter().flat_map(|day| day.slots.iter())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailableSlot {
    pub doctor_id: Uuid,
    pub doctor_name: String,
    pub slot_time: DateTime<Utc>,
    pub local_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoctorFilter {
    All,
    Doctor(Uuid),
}

impl FromStr for DoctorFilter {
    type Err = AppointmentError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") || value.eq_ignore_ascii_case("todos") {
            return Ok(DoctorFilter::All);
        }
        Uuid::parse_str(value)
            .map(DoctorFilter::Doctor)
            .map_err(|_| AppointmentError::ValidationError(format!("Invalid doctor filter '{}'", value)))
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct BookSlotRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub slot_time: DateTime<Utc>,
    pub reason: Option<String>,
}

/// HTTP body for booking; the patient is always the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookSlotBody {
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub slot_time: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackoutBody {
    pub slot_time: String,
    pub blocked: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlackoutChange {
    Created,
    AlreadyBlocked,
    Removed,
    NotBlocked,
}

impl BlackoutChange {
    pub fn is_blocked(&self) -> bool {
        matches!(self, BlackoutChange::Created | BlackoutChange::AlreadyBlocked)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleQuery {
    pub date: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DayAvailabilityQuery {
    pub date: Option<String>,
    pub doctor: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
    pub q: Option<String>,
    pub limit: Option<usize>,
}

/// Store-level appointment filter. `from` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppointmentQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    /// Either the patient or the doctor is one of these profiles.
    pub participants: Option<Vec<Uuid>>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub newest_first: bool,
    pub limit: Option<usize>,
}

impl AppointmentQuery {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.participants.as_ref().map_or(true, |ids| {
                ids.contains(&appointment.patient_id) || ids.contains(&appointment.doctor_id)
            })
            && self.status.map_or(true, |status| appointment.status == status)
            && self.from.map_or(true, |from| appointment.slot_time >= from)
            && self.until.map_or(true, |until| appointment.slot_time < until)
    }
}

// ==============================================================================
// OVERVIEW MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorDashboard {
    pub doctor_id: Uuid,
    pub today: NaiveDate,
    pub todays_appointments: Vec<Appointment>,
    pub next_appointment: Option<Appointment>,
    pub week_appointment_count: usize,
    pub total_patients: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientOverview {
    pub patient_id: Uuid,
    pub next_appointment: Option<Appointment>,
    pub past_appointment_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub appointment: Appointment,
    pub patient_name: String,
    pub doctor_name: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Appointment slot not available")]
    SlotUnavailable,

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::SlotUnavailable => {
                AppError::Conflict("Appointment slot no longer available".to_string())
            }
            AppointmentError::InvalidTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Unauthorized(msg) => AppError::Forbidden(msg),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}
