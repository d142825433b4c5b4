mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, DoctorFilter, SlotState};
use appointment_cell::services::{AvailabilityService, BlackoutService, BookingService};
use appointment_cell::store::SchedulingStore;

use common::{instant, monday, Clinic, InstrumentedStore};

#[tokio::test]
async fn test_empty_week_has_35_available_slots() {
    let clinic = Clinic::seed().await;
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    let week = availability.week_grid(monday(), clinic.doctor.id).await.unwrap();

    assert_eq!(week.days.len(), 5);
    assert_eq!(week.slots().count(), 35);
    assert!(week.slots().all(|slot| slot.state == SlotState::Available));
    assert!(week.days.iter().all(|day| !matches!(day.date.weekday(), Weekday::Sat | Weekday::Sun)));
    assert!(week.slots().all(|slot| (10..=16).contains(&slot.local_time.hour())));
    assert_eq!(week.doctor_name, "Bruno Araya");
    assert_eq!(week.slots().next().unwrap().slot_time, instant("2024-06-10T14:00:00Z"));
}

#[tokio::test]
async fn test_week_navigation_from_midweek_anchor() {
    let clinic = Clinic::seed().await;
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    let wednesday = NaiveDate::from_ymd_opt(2024, 6, 12).unwrap();
    let week = availability.week_grid(wednesday, clinic.doctor.id).await.unwrap();

    assert_eq!(week.start_of_week, monday());
    assert_eq!(week.previous_week, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
    assert_eq!(week.next_week, NaiveDate::from_ymd_opt(2024, 6, 17).unwrap());
    assert_eq!(week.days[0].date, monday());
}

#[tokio::test]
async fn test_booked_slot_shows_reserved_with_patient() {
    let clinic = Clinic::seed().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());
    let ten_local = instant("2024-06-10T14:00:00Z");

    let appointment_id = booking
        .book_slot(clinic.booking(clinic.patient.id, clinic.doctor.id, ten_local))
        .await
        .unwrap();

    let week = availability.week_grid(monday(), clinic.doctor.id).await.unwrap();
    let slot = week.slots().find(|slot| slot.slot_time == ten_local).unwrap();

    assert_matches!(
        &slot.state,
        SlotState::Reserved { appointment_id: id, patient_id, reason }
            if *id == appointment_id && *patient_id == clinic.patient.id && reason == "Chest pain"
    );
    assert_eq!(week.slots().filter(|slot| slot.state == SlotState::Available).count(), 34);
}

#[tokio::test]
async fn test_reserved_dominates_blocked_in_grid() {
    let clinic = Clinic::seed().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let blackouts = BlackoutService::with_store(clinic.dyn_store());
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());
    let slot_time = instant("2024-06-11T15:00:00Z");

    booking
        .book_slot(clinic.booking(clinic.patient.id, clinic.doctor.id, slot_time))
        .await
        .unwrap();
    // Blocking does not look at reservations, so both rows now share the key.
    blackouts.set_blackout(clinic.doctor.id, slot_time, true).await.unwrap();
    blackouts.set_blackout(clinic.doctor.id, instant("2024-06-11T16:00:00Z"), true).await.unwrap();

    let week = availability.week_grid(monday(), clinic.doctor.id).await.unwrap();
    let state_at = |at: &str| week.slots().find(|slot| slot.slot_time == instant(at)).unwrap().state.clone();

    assert_matches!(state_at("2024-06-11T15:00:00Z"), SlotState::Reserved { .. });
    assert_eq!(state_at("2024-06-11T16:00:00Z"), SlotState::Blocked);
}

#[tokio::test]
async fn test_week_grid_requires_a_doctor() {
    let clinic = Clinic::seed().await;
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    let for_patient = availability.week_grid(monday(), clinic.patient.id).await;
    assert_matches!(for_patient, Err(AppointmentError::NotFound(_)));

    let for_nobody = availability.week_grid(monday(), Uuid::new_v4()).await;
    assert_matches!(for_nobody, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn test_day_availability_merges_specialty_doctors() {
    let clinic = Clinic::seed().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let blackouts = BlackoutService::with_store(clinic.dyn_store());
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    booking
        .book_slot(clinic.booking(clinic.patient.id, clinic.doctor.id, instant("2024-06-10T14:00:00Z")))
        .await
        .unwrap();
    blackouts
        .set_blackout(clinic.colleague.id, instant("2024-06-10T15:00:00Z"), true)
        .await
        .unwrap();

    let slots = availability
        .day_availability(clinic.cardiology, monday(), DoctorFilter::All)
        .await
        .unwrap();

    // Two cardiologists, seven hours each, minus one reservation and one blackout.
    assert_eq!(slots.len(), 12);
    assert!(slots.iter().all(|slot| slot.doctor_id != clinic.dermatologist.id));
    assert!(slots.windows(2).all(|pair| {
        (pair[0].slot_time, &pair[0].doctor_name) <= (pair[1].slot_time, &pair[1].doctor_name)
    }));

    // At 10:00 only the colleague is free; at 12:00 both are and "Ana Soto" sorts first.
    assert_eq!(slots[0].doctor_id, clinic.colleague.id);
    let noon: Vec<_> = slots.iter().filter(|slot| slot.slot_time == instant("2024-06-10T16:00:00Z")).collect();
    assert_eq!(noon.len(), 2);
    assert_eq!(noon[0].doctor_name, "Ana Soto");
    assert_eq!(noon[1].doctor_name, "Bruno Araya");
}

#[tokio::test]
async fn test_day_availability_for_one_doctor() {
    let clinic = Clinic::seed().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    booking
        .book_slot(clinic.booking(clinic.patient.id, clinic.doctor.id, instant("2024-06-10T18:00:00Z")))
        .await
        .unwrap();

    let slots = availability
        .day_availability(clinic.cardiology, monday(), DoctorFilter::Doctor(clinic.doctor.id))
        .await
        .unwrap();
    assert_eq!(slots.len(), 6);
    assert!(slots.iter().all(|slot| slot.doctor_id == clinic.doctor.id));

    // A doctor outside the specialty yields nothing rather than an error.
    let elsewhere = availability
        .day_availability(clinic.cardiology, monday(), DoctorFilter::Doctor(clinic.dermatologist.id))
        .await
        .unwrap();
    assert!(elsewhere.is_empty());
}

#[tokio::test]
async fn test_day_availability_unknown_specialty() {
    let clinic = Clinic::seed().await;
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    let result = availability.day_availability(Uuid::new_v4(), monday(), DoctorFilter::All).await;
    assert_matches!(result, Err(AppointmentError::NotFound(_)));
}

#[tokio::test]
async fn test_weekend_day_performs_no_window_reads() {
    let clinic = Clinic::seed().await;
    let instrumented = Arc::new(InstrumentedStore::new(clinic.store.clone(), false));
    let store: Arc<dyn SchedulingStore> = instrumented.clone();
    let availability = AvailabilityService::with_store(store, clinic.schedule.clone());

    let saturday = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
    let slots = availability
        .day_availability(clinic.cardiology, saturday, DoctorFilter::All)
        .await
        .unwrap();

    assert!(slots.is_empty());
    assert_eq!(instrumented.window_reads(), 0);

    availability
        .day_availability(clinic.cardiology, monday(), DoctorFilter::All)
        .await
        .unwrap();
    assert_eq!(instrumented.window_reads(), 2);
}

#[tokio::test]
async fn test_grid_ignores_records_outside_the_week() {
    let clinic = Clinic::seed().await;
    let booking = BookingService::with_store(clinic.dyn_store());
    let availability = AvailabilityService::with_store(clinic.dyn_store(), clinic.schedule.clone());

    // Friday 16:00 local of the previous week and Monday 10:00 local of the next.
    for at in ["2024-06-07T20:00:00Z", "2024-06-17T14:00:00Z"] {
        booking
            .book_slot(clinic.booking(clinic.patient.id, clinic.doctor.id, instant(at)))
            .await
            .unwrap();
    }

    let week = availability.week_grid(monday(), clinic.doctor.id).await.unwrap();
    assert!(week.slots().all(|slot| slot.state == SlotState::Available));
}

#[tokio::test]
async fn test_week_at_calendar_edge_is_a_validation_error() {
    let clinic = Clinic::seed().await;
    let store = Arc::new(InstrumentedStore::new(clinic.store.clone(), false));
    let availability = AvailabilityService::with_store(store.clone(), clinic.schedule.clone());

    let result = availability.week_grid(NaiveDate::MAX, clinic.doctor.id).await;

    assert_matches!(result, Err(AppointmentError::ValidationError(_)));
    assert_eq!(store.window_reads(), 0);
}
