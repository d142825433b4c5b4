mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus, NewAppointment, Requester};
use appointment_cell::services::overview::MAX_LIST_LIMIT;
use appointment_cell::services::{BookingService, OverviewService};
use appointment_cell::store::SchedulingStore;
use shared_models::auth::Role;

use common::{instant, monday, Clinic};

/// Monday 09:00 in Santiago.
const NOW: &str = "2024-06-10T13:00:00Z";

struct Booked {
    clinic: Clinic,
    this_morning: Uuid,
    third_patient: Uuid,
}

async fn booked_week() -> Booked {
    let clinic = Clinic::seed().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let third_patient = Uuid::new_v4();

    let book = |patient_id: Uuid, at: &'static str| {
        let request = clinic.booking(patient_id, clinic.doctor.id, instant(at));
        let booking = &booking;
        async move { booking.book_slot(request).await.unwrap() }
    };

    let this_morning = book(clinic.patient.id, "2024-06-10T14:00:00Z").await;
    book(clinic.other_patient.id, "2024-06-10T19:00:00Z").await;
    book(clinic.patient.id, "2024-06-12T15:00:00Z").await;
    book(clinic.other_patient.id, "2024-06-17T14:00:00Z").await;
    book(third_patient, "2024-06-07T14:00:00Z").await;
    book(clinic.patient.id, "2024-06-05T14:00:00Z").await;

    Booked { clinic, this_morning, third_patient }
}

fn overview(clinic: &Clinic) -> OverviewService {
    OverviewService::with_store(clinic.dyn_store(), clinic.schedule.clone())
}

#[tokio::test]
async fn test_doctor_dashboard_counts_bounded_windows() {
    let Booked { clinic, this_morning, .. } = booked_week().await;

    let dashboard = overview(&clinic).doctor_dashboard(clinic.doctor.id, instant(NOW)).await.unwrap();

    assert_eq!(dashboard.today, monday());
    assert_eq!(dashboard.todays_appointments.len(), 2);
    assert!(dashboard.todays_appointments[0].slot_time < dashboard.todays_appointments[1].slot_time);
    assert_eq!(dashboard.next_appointment.as_ref().map(|a| a.id), Some(this_morning));
    assert_eq!(dashboard.week_appointment_count, 3);
    assert_eq!(dashboard.total_patients, 3);
}

#[tokio::test]
async fn test_dashboard_next_appointment_skips_cancelled() {
    let Booked { clinic, this_morning, .. } = booked_week().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let owner = Requester::new(clinic.patient.id, Role::Usuario);

    booking.cancel_appointment(this_morning, &owner, instant(NOW)).await.unwrap();
    let dashboard = overview(&clinic).doctor_dashboard(clinic.doctor.id, instant(NOW)).await.unwrap();

    // Cancelled rows still appear in today's list but are not "next".
    assert_eq!(dashboard.todays_appointments.len(), 2);
    assert_eq!(
        dashboard.next_appointment.map(|a| a.slot_time),
        Some(instant("2024-06-10T19:00:00Z"))
    );
}

#[tokio::test]
async fn test_dashboard_requires_a_doctor() {
    let clinic = Clinic::seed().await;
    let result = overview(&clinic).doctor_dashboard(clinic.patient.id, instant(NOW)).await;
    assert_matches!(result, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn test_patient_overview() {
    let Booked { clinic, this_morning, third_patient } = booked_week().await;
    let overview = overview(&clinic);

    let patient = overview.patient_overview(clinic.patient.id, instant(NOW)).await.unwrap();
    assert_eq!(patient.next_appointment.map(|a| a.id), Some(this_morning));
    assert_eq!(patient.past_appointment_count, 1);

    let third = overview.patient_overview(third_patient, instant(NOW)).await.unwrap();
    assert!(third.next_appointment.is_none());
    assert_eq!(third.past_appointment_count, 1);
}

#[tokio::test]
async fn test_staff_listing_newest_first_with_filters() {
    let Booked { clinic, this_morning, .. } = booked_week().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let admin = Requester::new(clinic.admin.id, Role::Admin);
    booking.cancel_appointment(this_morning, &admin, instant(NOW)).await.unwrap();

    let overview = overview(&clinic);

    let all = overview.list_appointments(None, None, None).await.unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all[0].appointment.slot_time, instant("2024-06-17T14:00:00Z"));
    assert!(all.windows(2).all(|pair| pair[0].appointment.slot_time >= pair[1].appointment.slot_time));
    assert_eq!(all[0].doctor_name, "Bruno Araya");
    assert_eq!(all[0].patient_name, "Elena Vidal");

    let cancelled = overview
        .list_appointments(Some(AppointmentStatus::Cancelled), None, None)
        .await
        .unwrap();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].appointment.id, this_morning);

    let by_patient = overview.list_appointments(None, Some("ROJAS"), None).await.unwrap();
    assert_eq!(by_patient.len(), 3);
    assert!(by_patient.iter().all(|summary| summary.patient_name == "Diego Rojas"));

    let by_doctor = overview.list_appointments(None, Some("bruno"), None).await.unwrap();
    assert_eq!(by_doctor.len(), 6);

    let nobody = overview.list_appointments(None, Some("soto"), None).await.unwrap();
    assert!(nobody.is_empty());

    let limited = overview.list_appointments(None, None, Some(2)).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn test_doctors_listed_by_last_then_first_name() {
    let clinic = Clinic::seed().await;

    let doctors = overview(&clinic).list_doctors().await.unwrap();
    let names: Vec<String> = doctors.iter().map(|doctor| doctor.full_name()).collect();

    assert_eq!(names, vec!["Bruno Araya", "Carla Munoz", "Ana Soto"]);
}

#[tokio::test]
async fn test_name_search_reaches_past_the_newest_page() {
    let clinic = Clinic::seed().await;
    let oldest = instant("2020-01-06T14:00:00Z");

    let matching = clinic
        .store
        .insert_appointment(NewAppointment {
            patient_id: clinic.patient.id,
            doctor_id: clinic.colleague.id,
            specialty_id: clinic.cardiology,
            slot_time: oldest,
            reason: String::new(),
        })
        .await
        .unwrap();
    for hour in 1..=MAX_LIST_LIMIT as i64 {
        clinic
            .store
            .insert_appointment(NewAppointment {
                patient_id: clinic.other_patient.id,
                doctor_id: clinic.doctor.id,
                specialty_id: clinic.cardiology,
                slot_time: oldest + Duration::hours(hour),
                reason: String::new(),
            })
            .await
            .unwrap();
    }
    assert_eq!(clinic.store.appointment_count().await, MAX_LIST_LIMIT + 1);

    let found = overview(&clinic).list_appointments(None, Some("rojas"), None).await.unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].appointment.id, matching.id);
    assert_eq!(found[0].patient_name, "Diego Rojas");
    assert_eq!(found[0].doctor_name, "Ana Soto");
}

#[tokio::test]
async fn test_doctor_patients_distinct_and_sorted() {
    let Booked { clinic, third_patient, .. } = booked_week().await;

    let patients = overview(&clinic).doctor_patients(clinic.doctor.id).await.unwrap();
    let names: Vec<String> = patients.iter().map(|patient| patient.full_name()).collect();

    // The third patient has no profile and is left out.
    assert_eq!(names, vec!["Diego Rojas", "Elena Vidal"]);
    assert!(patients.iter().all(|patient| patient.id != third_patient));

    let colleague = overview(&clinic).doctor_patients(clinic.colleague.id).await.unwrap();
    assert!(colleague.is_empty());

    assert_matches!(
        overview(&clinic).doctor_patients(clinic.patient.id).await,
        Err(AppointmentError::NotFound(_))
    );
}
