// API request/response models (DTOs)

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::import::ImportStatus;

/// Standard API response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta: Some(Meta::now()),
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
            meta: Some(Meta::now()),
        }
    }
}

/// Metadata included in all API responses
#[derive(Debug, Serialize, Deserialize)]
pub struct Meta {
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
    pub version: String,
}

impl Meta {
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            request_id: uuid::Uuid::new_v4().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub database: String,
    pub import_running: bool,
}

fn rfc3339(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// Import job status as returned by the status endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ImportStatusResponse {
    pub status: String, // "idle", "running", "succeeded", "failed"
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub source_file: String,
    pub processed_rows: u64,
    pub upserted_rows: u64,
    pub error: String,
}

impl From<ImportStatus> for ImportStatusResponse {
    fn from(s: ImportStatus) -> Self {
        Self {
            status: s.status.as_str().to_string(),
            started_at: rfc3339(s.started_at),
            finished_at: rfc3339(s.finished_at),
            source_file: s
                .source_file
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            processed_rows: s.processed_rows,
            upserted_rows: s.upserted_rows,
            error: s.error,
        }
    }
}

/// Acknowledgement for an accepted import trigger.
#[derive(Debug, Serialize, Deserialize)]
pub struct ImportAcceptedResponse {
    pub status: String,
    pub started_at: Option<String>,
    pub source_file: String,
}

impl From<ImportStatus> for ImportAcceptedResponse {
    fn from(s: ImportStatus) -> Self {
        let full = ImportStatusResponse::from(s);
        Self {
            status: full.status,
            started_at: full.started_at,
            source_file: full.source_file,
        }
    }
}
