// libs/appointment-cell/src/state.rs
use std::sync::Arc;

use tracing::info;

use shared_config::{AppConfig, StoreBackend};

use crate::models::AppointmentError;
use crate::services::calendar::ClinicSchedule;
use crate::store::{InMemoryStore, SchedulingStore, SupabaseStore};

/// Shared handles for the scheduling router. Services are built per request from these.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
    pub schedule: Arc<ClinicSchedule>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> Result<Self, AppointmentError> {
        let store: Arc<dyn SchedulingStore> = match config.store_backend {
            StoreBackend::Supabase => {
                info!("Scheduling store: Supabase at {}", config.supabase_url);
                Arc::new(SupabaseStore::new(&config))
            }
            StoreBackend::Memory => {
                info!("Scheduling store: in-memory");
                Arc::new(InMemoryStore::new())
            }
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn SchedulingStore>) -> Result<Self, AppointmentError> {
        let schedule = ClinicSchedule::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            store,
            schedule: Arc::new(schedule),
        })
    }
}
