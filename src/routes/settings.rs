use actix_web::{get, put, web, HttpResponse};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;

use crate::middleware::AdminUser;
use crate::models::setting::{ActiveModel as SettingActiveModel, Entity as Settings};

// DTO pour la mise à jour d'un paramètre
#[derive(Deserialize)]
pub struct UpdateSettingRequest {
    pub value: String,
}

async fn setting_value(db: &DatabaseConnection, key: &str) -> Result<Option<String>, sea_orm::DbErr> {
    Ok(Settings::find_by_id(key).one(db).await?.map(|s| s.value))
}

/// GET /api/settings/public - Paramètres exposés au storefront (PUBLIC)
#[get("/public")]
pub async fn public_settings(db: web::Data<DatabaseConnection>) -> HttpResponse {
    let support = setting_value(db.get_ref(), "support_telegram").await;
    let gateway = setting_value(db.get_ref(), "payment_gateway").await;
    let promo = setting_value(db.get_ref(), "black_friday_promo").await;
    let forced = setting_value(db.get_ref(), "forced_purchase_enabled").await;

    match (support, gateway, promo, forced) {
        (Ok(support), Ok(gateway), Ok(promo), Ok(forced)) => {
            HttpResponse::Ok().json(serde_json::json!({
                "supportTelegram": support.unwrap_or_default(),
                "paymentGateway": gateway.unwrap_or_else(|| "pushinpay".to_string()),
                "blackFridayPromo": promo.as_deref() == Some("true"),
                "forcedPurchase": forced.as_deref() == Some("true"),
            }))
        }
        _ => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Failed to fetch settings"
        })),
    }
}

/// GET /api/settings - Tous les paramètres (ADMIN)
#[get("")]
pub async fn list_settings(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match Settings::find().all(db.get_ref()).await {
        Ok(settings) => HttpResponse::Ok().json(serde_json::json!({ "settings": settings })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// GET /api/settings/{key} - Un paramètre (ADMIN)
#[get("/{key}")]
pub async fn get_setting(
    _admin: AdminUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let key = path.into_inner();

    match Settings::find_by_id(&key).one(db.get_ref()).await {
        Ok(Some(setting)) => HttpResponse::Ok().json(serde_json::json!({ "setting": setting })),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "Setting not found"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// PUT /api/settings/{key} - Créer ou mettre à jour un paramètre (ADMIN)
#[put("/{key}")]
pub async fn upsert_setting(
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<UpdateSettingRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let key = path.into_inner();

    if body.value.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Value is required"
        }));
    }

    let existing = match Settings::find_by_id(&key).one(db.get_ref()).await {
        Ok(existing) => existing,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let result = match existing {
        Some(setting) => {
            let mut active: SettingActiveModel = setting.into();
            active.value = Set(body.value.clone());
            active.update(db.get_ref()).await
        }
        None => {
            let new_setting = SettingActiveModel {
                key: Set(key),
                value: Set(body.value.clone()),
            };
            new_setting.insert(db.get_ref()).await
        }
    };

    match result {
        Ok(setting) => HttpResponse::Ok().json(serde_json::json!({ "setting": setting })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to save setting: {}", e)
        })),
    }
}

pub fn settings_routes(cfg: &mut web::ServiceConfig) {
    // /public doit être enregistré avant /{key}
    cfg.service(
        web::scope("/settings")
            .service(public_settings)
            .service(list_settings)
            .service(get_setting)
            .service(upsert_setting)
    );
}
