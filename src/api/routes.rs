// API route configuration

use crate::api::handlers;
use crate::import::CatalogStore;
use actix_web::web;

pub fn configure_routes<S: CatalogStore>(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check::<S>))
        .route("/", web::get().to(handlers::health_check::<S>))
        // Catalog import control
        .service(
            web::scope("/api/admin/movies/import")
                .route("", web::post().to(handlers::start_import::<S>))
                .route("/status", web::get().to(handlers::get_import_status::<S>))
                .route("/cancel", web::post().to(handlers::cancel_import::<S>)),
        );
}
