use std::env;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_CLINIC_TIMEZONE: &str = "America/Santiago";
pub const DEFAULT_OPENING_HOUR: u32 = 10;
pub const DEFAULT_LAST_SLOT_HOUR: u32 = 16;
pub const DEFAULT_API_PORT: u16 = 3000;

/// Which persistence backend the scheduling core talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Supabase,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => Ok(StoreBackend::Memory),
            "supabase" | "postgrest" => Ok(StoreBackend::Supabase),
            other => Err(format!("Unknown scheduling store '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub clinic_timezone: String,
    pub opening_hour: u32,
    pub last_slot_hour: u32,
    pub store_backend: StoreBackend,
    pub api_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let supabase_url = env::var("SUPABASE_URL")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_URL not set, using empty value");
                String::new()
            });
        let supabase_anon_key = env::var("SUPABASE_ANON_PUBLIC_KEY")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                String::new()
            });
        let supabase_jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .unwrap_or_else(|_| {
                warn!("SUPABASE_JWT_SECRET not set, using empty value");
                String::new()
            });

        let clinic_timezone = env::var("CLINIC_TIMEZONE")
            .unwrap_or_else(|_| {
                warn!("CLINIC_TIMEZONE not set, using {}", DEFAULT_CLINIC_TIMEZONE);
                DEFAULT_CLINIC_TIMEZONE.to_string()
            });

        let opening_hour = parse_var("CLINIC_OPENING_HOUR", DEFAULT_OPENING_HOUR);
        let last_slot_hour = parse_var("CLINIC_LAST_SLOT_HOUR", DEFAULT_LAST_SLOT_HOUR);
        let api_port = parse_var("API_PORT", DEFAULT_API_PORT);

        let supabase_ready = !supabase_url.is_empty() && !supabase_anon_key.is_empty();
        let store_backend = match env::var("SCHEDULING_STORE") {
            Ok(value) => value.parse().unwrap_or_else(|e: String| {
                warn!("{}, falling back to in-memory store", e);
                StoreBackend::Memory
            }),
            Err(_) if supabase_ready => StoreBackend::Supabase,
            Err(_) => {
                warn!("SCHEDULING_STORE not set and Supabase not configured, using in-memory store");
                StoreBackend::Memory
            }
        };

        let config = Self {
            supabase_url,
            supabase_anon_key,
            supabase_jwt_secret,
            clinic_timezone,
            opening_hour,
            last_slot_hour,
            store_backend,
            api_port,
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_jwt_secret.is_empty()
            && (self.store_backend == StoreBackend::Memory || self.is_supabase_configured())
    }

    pub fn is_supabase_configured(&self) -> bool {
        !self.supabase_url.is_empty() && !self.supabase_anon_key.is_empty()
    }
}

fn parse_var<T: FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value '{}', using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
