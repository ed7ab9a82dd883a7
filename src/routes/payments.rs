use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::middleware::AuthUser;
use crate::models::order::{
    ActiveModel as OrderActiveModel, Column as OrderColumn, Entity as Orders, OrderStatus,
};
use crate::models::price::Entity as Prices;
use crate::models::product::Entity as Products;
use crate::models::setting::Entity as Settings;
use crate::models::users::Role;
use crate::services::pushinpay::{self, PushinPayClient};

/// Nombre de clics côté serveur requis pour le force-complete.
/// Le compteur vit sur la commande, jamais dans la requête.
const FORCE_COMPLETE_CLICKS: i32 = 5;

/// Validité d'un QR code PIX côté client
const PIX_EXPIRY_MINUTES: i64 = 30;

// DTO pour l'initiation de paiement
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    pub price_id: String,
}

// Payload des webhooks PushinPay
#[derive(Deserialize)]
pub struct WebhookPayload {
    pub id: String,     // id de transaction gateway
    pub status: String, // "paid", "expired", ...
}

/// Décision du force-complete: la commande ne passe COMPLETED que si
/// elle est encore PENDING et que le compteur incrémenté atteint le
/// seuil. En dessous, elle reste PENDING.
fn force_complete_reaches_threshold(status: OrderStatus, clicks: i32) -> bool {
    status == OrderStatus::Pending && clicks >= FORCE_COMPLETE_CLICKS
}

/// Mappe un statut de webhook vers l'état terminal correspondant.
/// Tout statut inconnu est un no-op.
fn status_from_webhook(status: &str) -> Option<OrderStatus> {
    match status {
        "paid" => Some(OrderStatus::Completed),
        "expired" => Some(OrderStatus::Failed),
        _ => None,
    }
}

/// POST /api/payments/initiate-payment - Créer une charge PIX (PROTÉGÉE)
#[post("/initiate-payment")]
pub async fn initiate_payment(
    auth_user: AuthUser,
    body: web::Json<InitiatePaymentRequest>,
    db: web::Data<DatabaseConnection>,
    gateway: web::Data<PushinPayClient>,
) -> HttpResponse {
    // 1. Résoudre le prix et son produit parent
    let price = match Prices::find_by_id(body.price_id.clone()).one(db.get_ref()).await {
        Ok(Some(price)) => price,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Price not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    let product = match price.find_related(Products).one(db.get_ref()).await {
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

    // 2. Le produit doit être actif au moment de la commande
    if !product.is_active {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Product is not available"
        }));
    }

    // 3. PIX ne couvre que les prix en BRL; les autres devises passent
    //    par le flux manuel (support)
    if price.currency != "BRL" {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "PIX payment is only available for BRL prices"
        }));
    }

    // 4. Montant en centimes pour le gateway
    let value_cents = match pushinpay::amount_to_cents(price.amount) {
        Some(cents) if cents > 0 => cents,
        _ => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid price amount"
            }));
        }
    };

    // 5. Créer la commande PENDING avant l'appel gateway
    let now = Utc::now();
    let new_order = OrderActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(auth_user.user_id.clone()),
        price_id: Set(price.id.clone()),
        status: Set(OrderStatus::Pending),
        pushinpay_tx_id: Set(None),
        download_link: Set(None),
        force_clicks: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let order = match new_order.insert(db.get_ref()).await {
        Ok(order) => order,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to create order: {}", e)
            }));
        }
    };

    // 6. Appeler le gateway
    let backend_url = std::env::var("BACKEND_URL")
        .unwrap_or_else(|_| "http://localhost:3001".to_string());
    let webhook_url = format!("{}/api/payments/webhook", backend_url);

    let charge = match gateway.create_pix_charge(value_cents, &webhook_url).await {
        Ok(charge) => charge,
        Err(e) => {
            // Compensation: marquer la commande FAILED plutôt que de
            // laisser un PENDING orphelin sans transaction gateway
            eprintln!("⚠️  PushinPay error for order {}: {}", order.id, e);

            let mut failed: OrderActiveModel = order.into();
            failed.status = Set(OrderStatus::Failed);
            failed.updated_at = Set(Utc::now());
            if let Err(e) = failed.update(db.get_ref()).await {
                eprintln!("⚠️  Failed to mark order as FAILED: {}", e);
            }

            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to initiate payment"
            }));
        }
    };

    // 7. Persister l'id de transaction (clé de jointure des webhooks)
    let mut pending: OrderActiveModel = order.into();
    pending.pushinpay_tx_id = Set(Some(charge.id.clone()));
    pending.updated_at = Set(Utc::now());

    let order = match pending.update(db.get_ref()).await {
        Ok(order) => order,
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to persist transaction id: {}", e)
            }));
        }
    };

    // 8. Réponse avec tout ce qu'il faut pour afficher le paiement
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Payment initiated successfully",
        "orderId": order.id,
        "transactionId": charge.id,
        "pixCopyPaste": charge.qr_code,
        "qrCodeBase64": charge.qr_code_base64,
        "amount": pushinpay::format_amount(price.amount, &price.currency),
        "expiresAt": now + Duration::minutes(PIX_EXPIRY_MINUTES),
        "product": {
            "id": product.id,
            "name": product.name,
        },
        "price": {
            "id": price.id,
            "category": price.category,
            "currency": price.currency,
        },
    }))
}

/// POST /api/payments/webhook - Réconciliation des notifications PushinPay
/// Invoqué par le gateway, authentifié par signature HMAC
#[post("/webhook")]
pub async fn webhook(
    req: HttpRequest,
    body: web::Bytes,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Vérifier la signature HMAC sur le corps brut
    let secret = std::env::var("PUSHINPAY_WEBHOOK_SECRET").unwrap_or_default();
    let signature = req
        .headers()
        .get("x-pushinpay-signature")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    if !pushinpay::verify_webhook_signature(&body, signature, &secret) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid webhook signature"
        }));
    }

    // 2. Parser {id, status}
    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(_) => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid webhook payload"
            }));
        }
    };

    // 3. Retrouver la commande par l'id de transaction gateway.
    //    Peut échouer si le webhook arrive avant la persistance de l'id
    //    (course inhérente, le gateway réessaiera).
    let order = match Orders::find()
        .filter(OrderColumn::PushinpayTxId.eq(payload.id.clone()))
        .one(db.get_ref())
        .await
    {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    // 4. Garde d'idempotence: une commande terminale ne bouge plus,
    //    même si le gateway rejoue le webhook
    if order.status.is_terminal() {
        println!(
            "ℹ️  Webhook ignored: order {} already in terminal state {:?}",
            order.id, order.status
        );
        return HttpResponse::Ok().json(serde_json::json!({
            "message": "Webhook processed successfully"
        }));
    }

    // 5. Appliquer la transition
    match status_from_webhook(&payload.status) {
        Some(OrderStatus::Completed) => {
            // Libérer le lien de livraison porté par le prix
            let download_link = match order.find_related(Prices).one(db.get_ref()).await {
                Ok(price) => price.and_then(|p| p.delivery_link),
                Err(e) => {
                    return HttpResponse::InternalServerError().json(serde_json::json!({
                        "error": format!("Database error: {}", e)
                    }));
                }
            };

            let order_id = order.id.clone();
            let mut active: OrderActiveModel = order.into();
            active.status = Set(OrderStatus::Completed);
            active.download_link = Set(download_link);
            active.updated_at = Set(Utc::now());

            if let Err(e) = active.update(db.get_ref()).await {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Failed to update order: {}", e)
                }));
            }

            println!("✅ Order {} completed via webhook", order_id);
        }
        Some(OrderStatus::Failed) => {
            let mut active: OrderActiveModel = order.into();
            active.status = Set(OrderStatus::Failed);
            active.updated_at = Set(Utc::now());

            if let Err(e) = active.update(db.get_ref()).await {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Failed to update order: {}", e)
                }));
            }
        }
        // Statut inconnu ou intermédiaire: no-op, on acquitte quand même
        _ => {}
    }

    HttpResponse::Ok().json(serde_json::json!({
        "message": "Webhook processed successfully"
    }))
}

/// GET /api/payments/order/{orderId} - Statut d'une commande (PROTÉGÉE)
/// Accessible au propriétaire de la commande ou à un admin
#[get("/order/{order_id}")]
pub async fn get_order(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    let order_id = path.into_inner();

    let order = match Orders::find_by_id(order_id).one(db.get_ref()).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if order.user_id != auth_user.user_id && auth_user.role != Role::Admin {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Access denied"
        }));
    }

    // Joindre prix et produit pour l'affichage
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

    let mut order_value = serde_json::to_value(&order).unwrap_or_default();
    if let serde_json::Value::Object(ref mut map) = order_value {
        let mut price_value = serde_json::to_value(&price).unwrap_or_default();
        if let serde_json::Value::Object(ref mut price_map) = price_value {
            price_map.insert(
                "product".to_string(),
                serde_json::to_value(&product).unwrap_or_default(),
            );
        }
        map.insert("price".to_string(), price_value);
    }

    HttpResponse::Ok().json(serde_json::json!({ "order": order_value }))
}

/// GET /api/payments/check-status/{transactionId} - Passthrough gateway
/// (PROTÉGÉE). PushinPay limite cet appel à une fois par minute.
#[get("/check-status/{transaction_id}")]
pub async fn check_status(
    _auth_user: AuthUser,
    path: web::Path<String>,
    gateway: web::Data<PushinPayClient>,
) -> HttpResponse {
    let transaction_id = path.into_inner();

    match gateway.get_transaction(&transaction_id).await {
        Ok(transaction) => HttpResponse::Ok().json(transaction),
        Err(e) => {
            eprintln!("⚠️  PushinPay status check failed: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to check payment status"
            }))
        }
    }
}

/// POST /api/payments/force-complete/{orderId} - Contournement opérateur
/// (PROTÉGÉE). Actif uniquement quand forced_purchase_enabled vaut "true".
/// Le compteur de clics est incrémenté côté serveur à chaque appel
/// authentifié; il n'est jamais lu depuis le corps de la requête.
#[post("/force-complete/{order_id}")]
pub async fn force_complete(
    auth_user: AuthUser,
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> HttpResponse {
    // 1. Le contournement doit être activé par un opérateur
    let enabled = match Settings::find_by_id("forced_purchase_enabled")
        .one(db.get_ref())
        .await
    {
        Ok(setting) => setting.map(|s| s.value == "true").unwrap_or(false),
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if !enabled {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Forced purchase is not enabled"
        }));
    }

    // 2. Charger la commande, propriétaire ou admin uniquement
    let order_id = path.into_inner();
    let order = match Orders::find_by_id(order_id).one(db.get_ref()).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            return HttpResponse::NotFound().json(serde_json::json!({
                "error": "Order not found"
            }));
        }
        Err(e) => {
            return HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Database error: {}", e)
            }));
        }
    };

    if order.user_id != auth_user.user_id && auth_user.role != Role::Admin {
        return HttpResponse::Forbidden().json(serde_json::json!({
            "error": "Access denied"
        }));
    }

    // 3. Une commande terminale ne bouge plus
    if order.status.is_terminal() {
        return HttpResponse::Ok().json(serde_json::json!({
            "status": order.status,
            "clicks": order.force_clicks,
        }));
    }

    // 4. Incrémenter le compteur côté serveur
    let clicks = order.force_clicks + 1;

    if force_complete_reaches_threshold(order.status, clicks) {
        let download_link = match order.find_related(Prices).one(db.get_ref()).await {
            Ok(price) => price.and_then(|p| p.delivery_link),
            Err(e) => {
                return HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": format!("Database error: {}", e)
                }));
            }
        };

        let order_id = order.id.clone();
        let mut active: OrderActiveModel = order.into();
        active.status = Set(OrderStatus::Completed);
        active.download_link = Set(download_link);
        active.force_clicks = Set(clicks);
        active.updated_at = Set(Utc::now());

        match active.update(db.get_ref()).await {
            Ok(order) => {
                println!("✅ Order {} force-completed", order_id);
                HttpResponse::Ok().json(serde_json::json!({
                    "message": "Order completed",
                    "status": order.status,
                    "clicks": clicks,
                    "downloadLink": order.download_link,
                }))
            }
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to update order: {}", e)
            })),
        }
    } else {
        let mut active: OrderActiveModel = order.into();
        active.force_clicks = Set(clicks);
        active.updated_at = Set(Utc::now());

        match active.update(db.get_ref()).await {
            Ok(order) => HttpResponse::Ok().json(serde_json::json!({
                "status": order.status,
                "clicks": clicks,
                "remaining": FORCE_COMPLETE_CLICKS - clicks,
            })),
            Err(e) => HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to update order: {}", e)
            })),
        }
    }
}

pub fn payment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .service(initiate_payment)
            .service(webhook)
            .service(get_order)
            .service(check_status)
            .service(force_complete)
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paid_maps_to_completed() {
        assert_eq!(status_from_webhook("paid"), Some(OrderStatus::Completed));
    }

    #[test]
    fn test_expired_maps_to_failed() {
        assert_eq!(status_from_webhook("expired"), Some(OrderStatus::Failed));
    }

    #[test]
    fn test_unknown_status_is_noop() {
        assert_eq!(status_from_webhook("created"), None);
        assert_eq!(status_from_webhook("refunded"), None);
        assert_eq!(status_from_webhook(""), None);
    }

    #[test]
    fn test_force_complete_below_threshold_stays_pending() {
        assert!(!force_complete_reaches_threshold(OrderStatus::Pending, 1));
        // Limite: un clic sous le seuil ne complète pas
        assert!(!force_complete_reaches_threshold(
            OrderStatus::Pending,
            FORCE_COMPLETE_CLICKS - 1
        ));
    }

    #[test]
    fn test_force_complete_at_threshold_completes() {
        assert!(force_complete_reaches_threshold(
            OrderStatus::Pending,
            FORCE_COMPLETE_CLICKS
        ));
        assert!(force_complete_reaches_threshold(
            OrderStatus::Pending,
            FORCE_COMPLETE_CLICKS + 1
        ));
    }

    #[test]
    fn test_force_complete_never_touches_terminal_orders() {
        assert!(!force_complete_reaches_threshold(
            OrderStatus::Completed,
            FORCE_COMPLETE_CLICKS
        ));
        assert!(!force_complete_reaches_threshold(
            OrderStatus::Failed,
            FORCE_COMPLETE_CLICKS
        ));
    }
}
