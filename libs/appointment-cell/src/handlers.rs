// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::warn;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentListQuery, AppointmentStatus, BlackoutBody, BookSlotBody, BookSlotRequest,
    DayAvailabilityQuery, DoctorFilter, Requester, ScheduleQuery,
};
use crate::services::{
    AvailabilityService, BlackoutService, BookingService, OverviewService,
};
use crate::state::AppState;

// ==============================================================================
// CAPABILITY CHECKS
// ==============================================================================

fn requester(user: &User) -> Result<Requester, AppError> {
    let id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Token subject is not a valid user id".to_string()))?;
    Ok(Requester::new(id, user.clinic_role()))
}

fn require_staff(requester: &Requester) -> Result<(), AppError> {
    if requester.is_staff() {
        Ok(())
    } else {
        warn!("User {} ({}) denied staff-only operation", requester.id, requester.role);
        Err(AppError::Forbidden("Staff access required".to_string()))
    }
}

/// The doctor acting on their own calendar, or staff acting for them.
fn require_doctor_or_staff(requester: &Requester, doctor_id: Uuid) -> Result<(), AppError> {
    if requester.is_staff() || requester.id == doctor_id {
        Ok(())
    } else {
        warn!("User {} denied access to doctor {} calendar", requester.id, doctor_id);
        Err(AppError::Forbidden("Not authorized to manage this doctor's calendar".to_string()))
    }
}

// ==============================================================================
// DOCTOR CALENDAR HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_staff(&requester(&user)?)?;

    let doctors = OverviewService::new(&state).list_doctors().await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_week_grid(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<ScheduleQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor_or_staff(&requester(&user)?, doctor_id)?;

    let anchor = state.schedule.parse_date_or_today(query.date.as_deref(), Utc::now());
    let week = AvailabilityService::new(&state).week_grid(anchor, doctor_id).await?;

    Ok(Json(json!(week)))
}

#[axum::debug_handler]
pub async fn set_blackout(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Json(body): Json<BlackoutBody>,
) -> Result<Json<Value>, AppError> {
    require_doctor_or_staff(&requester(&user)?, doctor_id)?;

    let slot_time = state.schedule.parse_instant(&body.slot_time)?;
    let change = BlackoutService::new(&state)
        .set_blackout(doctor_id, slot_time, body.blocked)
        .await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "slot_time": slot_time,
        "blocked": change.is_blocked(),
        "change": change
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_dashboard(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor_or_staff(&requester(&user)?, doctor_id)?;

    let dashboard = OverviewService::new(&state).doctor_dashboard(doctor_id, Utc::now()).await?;

    Ok(Json(json!(dashboard)))
}

#[axum::debug_handler]
pub async fn get_doctor_patients(
    State(state): State<Arc<AppState>>,
    Path(doctor_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor_or_staff(&requester(&user)?, doctor_id)?;

    let patients = OverviewService::new(&state).doctor_patients(doctor_id).await?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "patients": patients,
        "total": patients.len()
    })))
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_day_availability(
    State(state): State<Arc<AppState>>,
    Path(specialty_id): Path<Uuid>,
    Query(query): Query<DayAvailabilityQuery>,
    Extension(_user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let date = state.schedule.parse_date_or_today(query.date.as_deref(), Utc::now());
    let filter: DoctorFilter = query.doctor.as_deref().unwrap_or_default().parse()?;

    let slots = AvailabilityService::new(&state)
        .day_availability(specialty_id, date, filter)
        .await?;

    Ok(Json(json!({
        "specialty_id": specialty_id,
        "date": date,
        "slots": slots,
        "total": slots.len()
    })))
}

#[axum::debug_handler]
pub async fn book_slot(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
    Json(body): Json<BookSlotBody>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let patient = requester(&user)?;
    let slot_time = state.schedule.parse_instant(&body.slot_time)?;

    let appointment_id = BookingService::new(&state)
        .book_slot(BookSlotRequest {
            patient_id: patient.id,
            doctor_id: body.doctor_id,
            specialty_id: body.specialty_id,
            slot_time,
            reason: body.reason,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment_id": appointment_id,
            "slot_time": slot_time,
            "message": "Appointment reserved"
        })),
    ))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;

    let appointment = BookingService::new(&state)
        .cancel_appointment(appointment_id, &requester, Utc::now())
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn get_patient_overview(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient = requester(&user)?;

    let overview = OverviewService::new(&state).patient_overview(patient.id, Utc::now()).await?;

    Ok(Json(json!(overview)))
}

// ==============================================================================
// DOCTOR AND STAFF HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppState>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let requester = requester(&user)?;

    let appointment = BookingService::new(&state)
        .complete_appointment(appointment_id, &requester)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AppointmentListQuery>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_staff(&requester(&user)?)?;

    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|status| !status.is_empty())
        .map(str::parse::<AppointmentStatus>)
        .transpose()?;

    let appointments = OverviewService::new(&state)
        .list_appointments(status, query.q.as_deref(), query.limit)
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
