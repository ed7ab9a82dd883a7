use actix_web::{get, HttpResponse};
use chrono::Utc;

use crate::middleware::GeoLocation;

#[get("/health")]
pub async fn health_check(geo: GeoLocation) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "geo": geo,
    }))
}
