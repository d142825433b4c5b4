use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, warn};

use shared_config::AppConfig;

/// Postgres SQLSTATE for unique_violation, surfaced by PostgREST in the error body.
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict ({code}): {message}")]
    Conflict { code: String, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("Invalid header value: {0}")]
    Header(String),
}

impl SupabaseError {
    /// True when the store rejected a write because a unique index already holds the key.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, SupabaseError::Conflict { code, .. } if code == UNIQUE_VIOLATION)
    }
}

impl From<reqwest::Error> for SupabaseError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SupabaseError::Decode(err.to_string())
        } else {
            SupabaseError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestErrorBody {
    code: Option<String>,
    message: Option<String>,
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).map_err(|e| SupabaseError::Header(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Without a user token PostgREST still needs a bearer; the API key doubles as one.
        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))
                .map_err(|e| SupabaseError::Header(e.to_string()))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T, SupabaseError>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            return Err(Self::classify_error(status, error_text));
        }

        // DELETE/PATCH without return=representation answer 204 with an empty body.
        let bytes = response.bytes().await?;
        let payload: &[u8] = if bytes.is_empty() { b"null" } else { &bytes };
        serde_json::from_slice::<T>(payload).map_err(|e| SupabaseError::Decode(e.to_string()))
    }

    fn classify_error(status: StatusCode, error_text: String) -> SupabaseError {
        let parsed: Option<PostgrestErrorBody> = serde_json::from_str(&error_text).ok();
        let code = parsed.as_ref().and_then(|b| b.code.clone());
        let message = parsed
            .and_then(|b| b.message)
            .unwrap_or_else(|| error_text.clone());

        match status.as_u16() {
            401 | 403 => {
                warn!("Supabase rejected credentials ({}): {}", status, message);
                SupabaseError::Auth(message)
            }
            404 => SupabaseError::NotFound(message),
            409 => {
                debug!("Supabase conflict ({}): {}", status, message);
                SupabaseError::Conflict {
                    code: code.unwrap_or_else(|| UNIQUE_VIOLATION.to_string()),
                    message,
                }
            }
            _ => {
                error!("API error ({}): {}", status, error_text);
                SupabaseError::Api { status: status.as_u16(), message }
            }
        }
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// `Prefer` header asking PostgREST to echo affected rows.
pub fn return_representation() -> HeaderMap {
    prefer("return=representation")
}

pub fn prefer(value: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static(value));
    headers
}
