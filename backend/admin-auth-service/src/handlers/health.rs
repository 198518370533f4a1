use actix_web::HttpResponse;
use chrono::Utc;
use serde_json::json;

/// Liveness probe; touches no collaborator.
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
