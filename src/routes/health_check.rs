use actix_web::HttpResponse;
use serde_json::json;

/// Liveness probe. Does not touch the stores.
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}
