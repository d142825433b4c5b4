// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::state::AppState;

pub fn scheduling_routes(state: Arc<AppState>) -> Router {
    Router::new()
        // Doctor calendars
        .route("/doctors", get(handlers::list_doctors))
        .route("/doctors/{doctor_id}/week", get(handlers::get_week_grid))
        .route("/doctors/{doctor_id}/blackouts", put(handlers::set_blackout))
        .route("/doctors/{doctor_id}/dashboard", get(handlers::get_doctor_dashboard))
        .route("/doctors/{doctor_id}/patients", get(handlers::get_doctor_patients))

        // Patient booking flow
        .route("/specialties/{specialty_id}/availability", get(handlers::get_day_availability))
        .route("/appointments", post(handlers::book_slot).get(handlers::list_appointments))
        .route("/appointments/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/appointments/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/patients/me/overview", get(handlers::get_patient_overview))

        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
