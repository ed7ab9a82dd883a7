use actix_web::{get, web, HttpResponse};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter};

use crate::middleware::GeoLocation;
use crate::models::price;
use crate::models::product::{self, Column as ProductColumn, Entity as Products};
use crate::models::product_region::Entity as ProductRegions;
use crate::services::catalog;

/// Sérialise un produit avec ses prix pour le storefront.
/// Les régions restent internes et ne sortent jamais dans la réponse.
pub fn product_payload(product: &product::Model, prices: &[price::Model]) -> serde_json::Value {
    let mut value = serde_json::to_value(product).unwrap_or_default();

    if let serde_json::Value::Object(ref mut map) = value {
        map.insert(
            "prices".to_string(),
            serde_json::to_value(prices).unwrap_or_default(),
        );
        map.insert(
            "availableInRegion".to_string(),
            serde_json::Value::Bool(true),
        );
    }

    value
}

/// GET /api/products - Liste filtrée par géolocalisation (PUBLIC)
#[get("")]
pub async fn list_products(
    geo: GeoLocation,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Tous les produits actifs
    let products = match Products::find()
        .filter(ProductColumn::IsActive.eq(true))
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

    // 2. Garder ceux visibles depuis le pays détecté
    let mut visible = Vec::new();

    for product in products {
        let regions = match product.find_related(ProductRegions).all(db.get_ref()).await {
            Ok(regions) => regions,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        if !catalog::is_visible_in_region(&regions, geo.country_code.as_deref()) {
            continue;
        }

        let prices = match product.find_related(price::Entity).all(db.get_ref()).await {
            Ok(prices) => prices,
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        visible.push(product_payload(&product, &prices));
    }

    let total_count = visible.len();

    HttpResponse::Ok().json(serde_json::json!({
        "products": visible,
        "detectedCountry": geo.country_code,
        "totalCount": total_count,
    }))
}

/// GET /api/products/{id} - Détail d'un produit (PUBLIC)
/// 403 si le produit est restreint à d'autres régions que celle du client
#[get("/{id}")]
pub async fn get_product(
    geo: GeoLocation,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let product_id = path.into_inner();

    let product = match Products::find_by_id(product_id).one(db.get_ref()).await {
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

    // Un produit désactivé est traité comme absent
    if !product.is_active {
        return HttpResponse::NotFound().json(serde_json::json!({
            "error": "Product not available"
        }));
    }

    let regions = match product.find_related(ProductRegions).all(db.get_ref()).await {
        Ok(regions) => regions,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if !catalog::is_visible_in_region(&regions, geo.country_code.as_deref()) {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Product not available in your region",
            "detectedCountry": geo.country_code,
        }));
    }

    let prices = match product.find_related(price::Entity).all(db.get_ref()).await {
        Ok(prices) => prices,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    HttpResponse::Ok().json(serde_json::json!({
        "product": product_payload(&product, &prices),
        "detectedCountry": geo.country_code,
    }))
}

pub fn product_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/products")
            .service(list_products)
            .service(get_product)
    );
}
