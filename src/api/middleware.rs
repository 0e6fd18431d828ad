// Request logging, compression and CORS for the admin API

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::middleware::{Compress, Logger};

/// Access log without health probes, which load balancers hit constantly.
pub fn setup_middleware() -> (Logger, Compress) {
    let logger = Logger::new(r#"%a "%r" %s %b %Dms"#).exclude("/health");
    (logger, Compress::default())
}

/// CORS for the browser admin UI. `allowed_origins` is comma separated.
pub fn setup_cors(allowed_origins: &str) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .max_age(3600);

    for origin in allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
    {
        cors = cors.allowed_origin(origin);
    }

    cors
}
