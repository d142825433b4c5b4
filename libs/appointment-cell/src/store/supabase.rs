// libs/appointment-cell/src/store/supabase.rs
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{prefer, return_representation, SupabaseClient};

use crate::models::{
    Appointment, AppointmentQuery, AppointmentStatus, Blackout, NewAppointment, Profile,
    Specialty, TimeWindow,
};
use super::{SchedulingStore, StoreError, StoreResult};

const PROFILE_COLUMNS: &str = "select=id,first_name,last_name,role,specialty_id";

/// PostgREST-backed store. Uniqueness lives in Postgres:
/// `unique (doctor_id, slot_time)` on both `appointments` and `blackouts`.
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    patient_id: Uuid,
}

fn encode_instant(instant: DateTime<Utc>) -> String {
    urlencoding::encode(&instant.to_rfc3339_opts(SecondsFormat::Secs, true)).into_owned()
}

fn id_list(ids: &[Uuid]) -> String {
    format!("in.({})", joined_ids(ids))
}

fn joined_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(",")
}

/// `ilike` pattern for a PostgREST logic tree. Quoting keeps commas and parentheses literal.
fn contains_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"*{}*\"", escaped)
}

impl SupabaseStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
        }
    }

    pub fn with_client(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> StoreResult<T> {
        Ok(self.supabase.request(Method::GET, path, None, None).await?)
    }

    async fn exists(&self, path: &str) -> StoreResult<bool> {
        let rows: Vec<IdRow> = self.get(path).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl SchedulingStore for SupabaseStore {
    async fn find_profile(&self, id: Uuid) -> StoreResult<Option<Profile>> {
        let path = format!("/rest/v1/profiles?id=eq.{}&{}", id, PROFILE_COLUMNS);
        let rows: Vec<Profile> = self.get(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_profiles(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let unique: Vec<Uuid> = ids.iter().copied().collect::<HashSet<_>>().into_iter().collect();
        let path = format!("/rest/v1/profiles?id={}&{}", id_list(&unique), PROFILE_COLUMNS);
        self.get(&path).await
    }

    async fn list_doctors(&self) -> StoreResult<Vec<Profile>> {
        let path = format!(
            "/rest/v1/profiles?role=eq.MEDICO&{}&order=last_name.asc,first_name.asc",
            PROFILE_COLUMNS
        );
        self.get(&path).await
    }

    async fn doctors_by_specialty(&self, specialty_id: Uuid) -> StoreResult<Vec<Profile>> {
        let path = format!(
            "/rest/v1/profiles?role=eq.MEDICO&specialty_id=eq.{}&{}&order=last_name.asc,first_name.asc",
            specialty_id, PROFILE_COLUMNS
        );
        self.get(&path).await
    }

    async fn find_specialty(&self, id: Uuid) -> StoreResult<Option<Specialty>> {
        let path = format!("/rest/v1/specialties?id=eq.{}", id);
        let rows: Vec<Specialty> = self.get(&path).await?;
        Ok(rows.into_iter().next())
    }

    async fn search_profile_ids(&self, term: &str) -> StoreResult<Vec<Uuid>> {
        let pattern = contains_pattern(term);
        let filter = format!("(first_name.ilike.{0},last_name.ilike.{0})", pattern);
        let path = format!("/rest/v1/profiles?or={}&select=id", urlencoding::encode(&filter));
        let rows: Vec<IdRow> = self.get(&path).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn reserved_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Appointment>> {
        if doctor_ids.is_empty() {
            return Ok(vec![]);
        }
        let path = format!(
            "/rest/v1/appointments?doctor_id={}&status=eq.{}&slot_time=gte.{}&slot_time=lt.{}",
            id_list(doctor_ids),
            AppointmentStatus::Reserved,
            encode_instant(window.start),
            encode_instant(window.end)
        );
        self.get(&path).await
    }

    async fn blackouts_in_window(&self, doctor_ids: &[Uuid], window: TimeWindow) -> StoreResult<Vec<Blackout>> {
        if doctor_ids.is_empty() {
            return Ok(vec![]);
        }
        let path = format!(
            "/rest/v1/blackouts?doctor_id={}&slot_time=gte.{}&slot_time=lt.{}",
            id_list(doctor_ids),
            encode_instant(window.start),
            encode_instant(window.end)
        );
        self.get(&path).await
    }

    async fn slot_taken(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        let key = format!("doctor_id=eq.{}&slot_time=eq.{}&select=id&limit=1", doctor_id, encode_instant(slot_time));
        let appointment_path = format!("/rest/v1/appointments?{}", key);
        let blackout_path = format!("/rest/v1/blackouts?{}", key);

        let (booked, blocked) = futures::try_join!(
            self.exists(&appointment_path),
            self.exists(&blackout_path)
        )?;
        Ok(booked || blocked)
    }

    async fn insert_appointment(&self, new: NewAppointment) -> StoreResult<Appointment> {
        let now = Utc::now().to_rfc3339();
        let body = json!({
            "patient_id": new.patient_id,
            "doctor_id": new.doctor_id,
            "specialty_id": new.specialty_id,
            "slot_time": new.slot_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "reason": new.reason,
            "status": AppointmentStatus::Reserved,
            "created_at": now,
            "updated_at": now
        });

        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            None,
            Some(body),
            Some(return_representation()),
        ).await?;

        let appointment = rows
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Backend("Insert returned no appointment row".to_string()))?;
        debug!("Appointment row {} inserted", appointment.id);
        Ok(appointment)
    }

    async fn find_appointment(&self, id: Uuid) -> StoreResult<Option<Appointment>> {
        let rows: Vec<Appointment> = self.get(&format!("/rest/v1/appointments?id=eq.{}", id)).await?;
        Ok(rows.into_iter().next())
    }

    async fn transition_status(
        &self,
        id: Uuid,
        from: AppointmentStatus,
        to: AppointmentStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<Appointment>> {
        // Filtering on the current status turns the PATCH into a compare-and-set.
        let path = format!("/rest/v1/appointments?id=eq.{}&status=eq.{}", id, from);
        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            None,
            Some(json!({ "status": to, "updated_at": at.to_rfc3339() })),
            Some(return_representation()),
        ).await?;
        Ok(rows.into_iter().next())
    }

    async fn query_appointments(&self, query: &AppointmentQuery) -> StoreResult<Vec<Appointment>> {
        let mut filters = Vec::new();
        if let Some(doctor_id) = query.doctor_id {
            filters.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            filters.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(participants) = &query.participants {
            let ids = joined_ids(participants);
            filters.push(format!("or=(patient_id.in.({0}),doctor_id.in.({0}))", ids));
        }
        if let Some(status) = query.status {
            filters.push(format!("status=eq.{}", status));
        }
        if let Some(from) = query.from {
            filters.push(format!("slot_time=gte.{}", encode_instant(from)));
        }
        if let Some(until) = query.until {
            filters.push(format!("slot_time=lt.{}", encode_instant(until)));
        }
        filters.push(format!("order=slot_time.{}", if query.newest_first { "desc" } else { "asc" }));
        if let Some(limit) = query.limit {
            filters.push(format!("limit={}", limit));
        }

        self.get(&format!("/rest/v1/appointments?{}", filters.join("&"))).await
    }

    async fn distinct_patient_ids(&self, doctor_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let path = format!("/rest/v1/appointments?doctor_id=eq.{}&select=patient_id", doctor_id);
        let rows: Vec<PatientRow> = self.get(&path).await?;
        let unique: HashSet<Uuid> = rows.into_iter().map(|row| row.patient_id).collect();
        Ok(unique.into_iter().collect())
    }

    async fn insert_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        let body = json!({
            "doctor_id": doctor_id,
            "slot_time": slot_time.to_rfc3339_opts(SecondsFormat::Secs, true),
            "created_at": Utc::now().to_rfc3339()
        });

        // ignore-duplicates makes this an INSERT .. ON CONFLICT DO NOTHING; an
        // empty representation means the key was already blocked.
        let rows: Vec<Blackout> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/blackouts?on_conflict=doctor_id,slot_time",
            None,
            Some(body),
            Some(prefer("resolution=ignore-duplicates,return=representation")),
        ).await?;

        let created = !rows.is_empty();
        if created {
            info!("Blackout created for doctor {} at {}", doctor_id, slot_time);
        }
        Ok(created)
    }

    async fn delete_blackout(&self, doctor_id: Uuid, slot_time: DateTime<Utc>) -> StoreResult<bool> {
        let path = format!(
            "/rest/v1/blackouts?doctor_id=eq.{}&slot_time=eq.{}",
            doctor_id,
            encode_instant(slot_time)
        );
        let rows: Vec<Blackout> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            None,
            None,
            Some(return_representation()),
        ).await?;
        Ok(!rows.is_empty())
    }
}
