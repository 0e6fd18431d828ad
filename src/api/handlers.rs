// HTTP request handlers for API endpoints

use crate::api::models::*;
use crate::import::{CatalogStore, ImportError, ImportService, StartOutcome};
use actix_web::{web, HttpResponse, Result};

/// Health check endpoint
pub async fn health_check<S: CatalogStore>(
    svc: web::Data<ImportService<S>>,
) -> Result<HttpResponse> {
    // Quick database connectivity check
    let db_status = match svc.store().ping().await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "health check: store ping failed");
            "disconnected"
        }
    };

    let response = ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        database: db_status.to_string(),
        import_running: svc.job().is_running(),
    });

    Ok(HttpResponse::Ok().json(response))
}

/// Kick off a catalog import from the newest dataset in the data directory.
/// Returns as soon as the run is scheduled; poll the status endpoint for the
/// outcome.
pub async fn start_import<S: CatalogStore>(
    svc: web::Data<ImportService<S>>,
) -> Result<HttpResponse> {
    let response = match svc.start() {
        StartOutcome::Accepted(snapshot) => HttpResponse::Accepted()
            .json(ApiResponse::success(ImportAcceptedResponse::from(snapshot))),
        StartOutcome::Conflict => {
            HttpResponse::Conflict().json(ApiResponse::error(ImportError::Conflict.to_string()))
        }
        StartOutcome::NotFound(_) => HttpResponse::NotFound().json(ApiResponse::error(
            "no movie id .json.gz files found in data directory",
        )),
        StartOutcome::InternalError(_) => HttpResponse::InternalServerError()
            .json(ApiResponse::error("failed to locate latest movie data file")),
    };
    Ok(response)
}

/// Latest import job snapshot; never waits on a running import.
pub async fn get_import_status<S: CatalogStore>(
    svc: web::Data<ImportService<S>>,
) -> Result<HttpResponse> {
    let response = ApiResponse::success(ImportStatusResponse::from(svc.status()));
    Ok(HttpResponse::Ok().json(response))
}

/// Ask the running import to stop at its next batch boundary.
pub async fn cancel_import<S: CatalogStore>(
    svc: web::Data<ImportService<S>>,
) -> Result<HttpResponse> {
    if !svc.cancel() {
        return Ok(HttpResponse::Conflict().json(ApiResponse::error("no movie import is running")));
    }
    let response = ApiResponse::success(ImportStatusResponse::from(svc.status()));
    Ok(HttpResponse::Accepted().json(response))
}
