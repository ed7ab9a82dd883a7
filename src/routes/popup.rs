use actix_web::{get, web, HttpResponse};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::models::popup_config::{Column as PopupColumn, Entity as PopupConfigs};

/// GET /api/popup - Première configuration de popup active (PUBLIC)
#[get("")]
pub async fn get_popup(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let popup = PopupConfigs::find()
        .filter(PopupColumn::IsActive.eq(true))
        .one(db.get_ref())
        .await;

    match popup {
        Ok(popup) => HttpResponse::Ok().json(serde_json::json!({ "popup": popup })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

pub fn popup_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/popup")
            .service(get_popup)
    );
}
