use actix_web::{delete, get, post, put, web, HttpResponse};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AdminUser;
use crate::models::order::{Column as OrderColumn, Entity as Orders};
use crate::models::popup_config::{ActiveModel as PopupActiveModel, Entity as PopupConfigs};
use crate::models::price::{ActiveModel as PriceActiveModel, Column as PriceColumn, Entity as Prices};
use crate::models::product::{self, ActiveModel as ProductActiveModel, Column as ProductColumn, Entity as Products};
use crate::models::product_region::{
    ActiveModel as RegionActiveModel, Column as RegionColumn, Entity as ProductRegions,
};
use crate::models::users::Entity as Users;
use crate::services::catalog;

// DTO pour un prix lors de la création d'un produit
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceInput {
    pub amount: Decimal,
    pub currency: String,
    pub category: String,
    pub delivery_link: Option<String>,
}

// DTO pour la création d'un produit
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub is_active: Option<bool>,
    pub preview_media_url: Option<String>,
    pub telegram_link: Option<String>,
    pub prices: Option<Vec<PriceInput>>,
}

// DTO pour la mise à jour d'un produit (champs partiels)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub is_active: Option<bool>,
    pub preview_media_url: Option<String>,
    pub telegram_link: Option<String>,
}

// DTO pour l'association produit/région
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRegionRequest {
    pub product_id: String,
    pub country_code: String,
}

// DTO pour la configuration du popup
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopupRequest {
    pub message: String,
    pub button_text: String,
    pub button_link: String,
    pub is_active: Option<bool>,
}

/// Valeur d'un champ optionnel éditable: une chaîne vide efface le champ
/// (remis à NULL), toute autre valeur le remplace.
fn optional_field(value: &str) -> Option<String> {
    let value = value.trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Sérialise un produit avec ses prix et ses régions (vue admin complète)
async fn admin_product_payload(
    db: &DatabaseConnection,
    product: &product::Model,
) -> Result<serde_json::Value, sea_orm::DbErr> {
    let prices = product.find_related(Prices).all(db).await?;
    let regions = product.find_related(ProductRegions).all(db).await?;

    let mut value = serde_json::to_value(product).unwrap_or_default();
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert(
            "prices".to_string(),
            serde_json::to_value(&prices).unwrap_or_default(),
        );
        map.insert(
            "regions".to_string(),
            serde_json::to_value(&regions).unwrap_or_default(),
        );
    }

    Ok(value)
}

/// GET /api/admin/products - Tous les produits, sans filtrage (ADMIN)
#[get("/products")]
pub async fn list_products(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let products = match Products::find()
        .order_by_desc(ProductColumn::CreatedAt)
        .all(db.get_ref())
        .await
    {
        Ok(products) => products,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut payloads = Vec::new();
    for product in &products {
        match admin_product_payload(db.get_ref(), product).await {
            Ok(payload) => payloads.push(payload),
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        }
    }

    HttpResponse::Ok().json(serde_json::json!({ "products": payloads }))
}

/// POST /api/admin/products - Créer un produit avec ses prix (ADMIN)
#[post("/products")]
pub async fn create_product(
    _admin: AdminUser,
    body: web::Json<CreateProductRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // Champs requis
    if body.name.trim().is_empty()
        || body.description.trim().is_empty()
        || body.image_url.trim().is_empty()
    {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Name, description, and imageUrl are required"
        }));
    }

    let now = Utc::now();
    let new_product = ProductActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        name: Set(body.name.trim().to_string()),
        description: Set(body.description.clone()),
        image_url: Set(body.image_url.clone()),
        is_active: Set(body.is_active.unwrap_or(true)),
        preview_media_url: Set(body.preview_media_url.clone()),
        telegram_link: Set(body.telegram_link.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let product = match new_product.insert(db.get_ref()).await {
        Ok(product) => product,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create product: {}", e)
            }));
        }
    };

    // Prix optionnels créés dans la foulée
    if let Some(prices) = &body.prices {
        for input in prices {
            let new_price = PriceActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                product_id: Set(product.id.clone()),
                amount: Set(input.amount),
                currency: Set(input.currency.clone()),
                category: Set(input.category.clone()),
                delivery_link: Set(input.delivery_link.clone()),
            };

            if let Err(e) = new_price.insert(db.get_ref()).await {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Failed to create price: {}", e)
                }));
            }
        }
    }

    match admin_product_payload(db.get_ref(), &product).await {
        Ok(payload) => HttpResponse::Created().json(serde_json::json!({
            "message": "Product created successfully",
            "product": payload,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// PUT /api/admin/products/{id} - Mettre à jour un produit (ADMIN)
#[put("/products/{id}")]
pub async fn update_product(
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<UpdateProductRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let product_id = path.into_inner();

    let existing = match Products::find_by_id(product_id).one(db.get_ref()).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Product not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut active: ProductActiveModel = existing.into();
    if let Some(name) = &body.name {
        active.name = Set(name.clone());
    }
    if let Some(description) = &body.description {
        active.description = Set(description.clone());
    }
    if let Some(image_url) = &body.image_url {
        active.image_url = Set(image_url.clone());
    }
    if let Some(is_active) = body.is_active {
        active.is_active = Set(is_active);
    }
    if let Some(preview) = &body.preview_media_url {
        active.preview_media_url = Set(optional_field(preview));
    }
    if let Some(link) = &body.telegram_link {
        active.telegram_link = Set(optional_field(link));
    }
    active.updated_at = Set(Utc::now());

    let product = match active.update(db.get_ref()).await {
        Ok(product) => product,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to update product: {}", e)
            }));
        }
    };

    match admin_product_payload(db.get_ref(), &product).await {
        Ok(payload) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Product updated successfully",
            "product": payload,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// DELETE /api/admin/products/{id} - Supprimer un produit (ADMIN)
/// Supprime d'abord les prix et régions associés
#[delete("/products/{id}")]
pub async fn delete_product(
    _admin: AdminUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let product_id = path.into_inner();

    let existing = match Products::find_by_id(product_id.clone()).one(db.get_ref()).await {
        Ok(Some(product)) => product,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Product not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let cleanup = async {
        ProductRegions::delete_many()
            .filter(RegionColumn::ProductId.eq(product_id.clone()))
            .exec(db.get_ref())
            .await?;
        Prices::delete_many()
            .filter(PriceColumn::ProductId.eq(product_id.clone()))
            .exec(db.get_ref())
            .await?;
        existing.delete(db.get_ref()).await
    };

    match cleanup.await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Product deleted successfully"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to delete product: {}", e)
        })),
    }
}

/// POST /api/admin/products/regions - Associer un produit à un pays (ADMIN)
#[post("/products/regions")]
pub async fn create_region(
    _admin: AdminUser,
    body: web::Json<CreateRegionRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if body.product_id.trim().is_empty() || body.country_code.trim().is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "productId and countryCode are required"
        }));
    }

    // Code pays ISO alpha-2, normalisé en majuscules
    let country_code = match catalog::normalize_country_code(&body.country_code) {
        Some(code) => code,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "countryCode must be a 2-letter ISO code (e.g., BR, US, ES)"
            }));
        }
    };

    match Products::find_by_id(body.product_id.clone()).one(db.get_ref()).await {
        Ok(Some(_)) => {}
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Product not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    }

    // Upsert: la paire (productId, countryCode) est unique
    let existing = ProductRegions::find()
        .filter(RegionColumn::ProductId.eq(body.product_id.clone()))
        .filter(RegionColumn::CountryCode.eq(country_code.clone()))
        .one(db.get_ref())
        .await;

    match existing {
        Ok(Some(region)) => {
            return HttpResponse::Created().json(serde_json::json!({
                "message": "Product region association created",
                "region": region,
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
        _ => {}
    }

    let new_region = RegionActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        product_id: Set(body.product_id.clone()),
        country_code: Set(country_code),
    };

    match new_region.insert(db.get_ref()).await {
        Ok(region) => HttpResponse::Created().json(serde_json::json!({
            "message": "Product region association created",
            "region": region,
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to create product region: {}", e)
        })),
    }
}

/// DELETE /api/admin/products/regions/{id} - Retirer une association (ADMIN)
#[delete("/products/regions/{id}")]
pub async fn delete_region(
    _admin: AdminUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let region_id = path.into_inner();

    match ProductRegions::delete_by_id(region_id).exec(db.get_ref()).await {
        Ok(result) if result.rows_affected == 0 => {
            HttpResponse::NotFound().json(serde_json::json!({
                "error": "Product region not found"
            }))
        }
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({
            "message": "Product region association deleted"
        })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to delete product region: {}", e)
        })),
    }
}

/// GET /api/admin/orders - Toutes les commandes, plus récentes d'abord (ADMIN)
#[get("/orders")]
pub async fn list_orders(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let orders = match Orders::find()
        .order_by_desc(OrderColumn::CreatedAt)
        .all(db.get_ref())
        .await
    {
        Ok(orders) => orders,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let mut payloads = Vec::new();

    for order in orders {
        let user = match Users::find_by_id(order.user_id.clone()).one(db.get_ref()).await {
            Ok(user) => user,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        let price = match order.find_related(Prices).one(db.get_ref()).await {
            Ok(price) => price,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        let product = match &price {
            Some(price) => match price.find_related(Products).one(db.get_ref()).await {
                Ok(product) => product,
                Err(e) => {
                    return HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": format!("Database error: {}", e)
                    }));
                }
            },
            None => None,
        };

        let mut value = serde_json::to_value(&order).unwrap_or_default();
        if let serde_json::Value::Object(ref mut map) = value {
            map.insert(
                "user".to_string(),
                match user {
                    Some(user) => serde_json::json!({
                        "id": user.id,
                        "email": user.email,
                        "role": user.role,
                    }),
                    None => serde_json::Value::Null,
                },
            );

            let mut price_value = serde_json::to_value(&price).unwrap_or_default();
            if let serde_json::Value::Object(ref mut price_map) = price_value {
                price_map.insert(
                    "product".to_string(),
                    serde_json::to_value(&product).unwrap_or_default(),
                );
            }
            map.insert("price".to_string(), price_value);
        }

        payloads.push(value);
    }

    HttpResponse::Ok().json(serde_json::json!({ "orders": payloads }))
}

/// GET /api/admin/popup - Toutes les configurations de popup (ADMIN)
#[get("/popup")]
pub async fn list_popups(
    _admin: AdminUser,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    match PopupConfigs::find().all(db.get_ref()).await {
        Ok(popups) => HttpResponse::Ok().json(serde_json::json!({ "popups": popups })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Database error: {}", e)
        })),
    }
}

/// PUT /api/admin/popup - Créer ou remplacer la configuration du popup (ADMIN)
#[put("/popup")]
pub async fn upsert_popup(
    _admin: AdminUser,
    body: web::Json<PopupRequest>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    if body.message.trim().is_empty()
        || body.button_text.trim().is_empty()
        || body.button_link.trim().is_empty()
    {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "message, buttonText, and buttonLink are required"
        }));
    }

    let existing = match PopupConfigs::find().one(db.get_ref()).await {
        Ok(existing) => existing,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let result = match existing {
        Some(popup) => {
            let mut active: PopupActiveModel = popup.into();
            active.message = Set(body.message.clone());
            active.button_text = Set(body.button_text.clone());
            active.button_link = Set(body.button_link.clone());
            active.is_active = Set(body.is_active.unwrap_or(true));
            active.update(db.get_ref()).await
        }
        None => {
            let new_popup = PopupActiveModel {
                id: Set(Uuid::new_v4().to_string()),
                message: Set(body.message.clone()),
                button_text: Set(body.button_text.clone()),
                button_link: Set(body.button_link.clone()),
                is_active: Set(body.is_active.unwrap_or(true)),
            };
            new_popup.insert(db.get_ref()).await
        }
    };

    match result {
        Ok(popup) => HttpResponse::Ok().json(serde_json::json!({ "popup": popup })),
        Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": format!("Failed to save popup config: {}", e)
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_field_keeps_value() {
        assert_eq!(
            optional_field("https://cdn.example.com/preview.mp4"),
            Some("https://cdn.example.com/preview.mp4".to_string())
        );
    }

    #[test]
    fn test_optional_field_empty_clears() {
        assert_eq!(optional_field(""), None);
        assert_eq!(optional_field("   "), None);
    }
}

pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    // /products/regions doit être enregistré avant /products/{id}
    cfg.service(
        web::scope("/admin")
            .service(create_region)
            .service(delete_region)
            .service(list_products)
            .service(create_product)
            .service(update_product)
            .service(delete_product)
            .service(list_orders)
            .service(list_popups)
            .service(upsert_popup)
    );
}
