//! Health check handler

use actix_web::HttpResponse;
use serde_json::json;

/// Liveness probe
///
/// GET /health
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "healthy",
        "service": "therapay",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
