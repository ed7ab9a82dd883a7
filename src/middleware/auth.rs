use actix_web::{dev::Payload, web, Error, FromRequest, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::future::LocalBoxFuture;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::users::{ActiveModel as UserActiveModel, Entity as Users, Role};
use crate::utils::jwt;

/// Token réémis lors de l'auto-provisionnement d'un guest. Déposé dans les
/// extensions de la requête, renvoyé au client via le header X-New-Token
/// (voir main.rs).
pub struct NewToken(pub String);

/// Structure qui contient les infos de l'utilisateur authentifié
/// Utilisée comme extracteur dans les routes protégées
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

fn auth_error(response: HttpResponse) -> Error {
    actix_web::error::InternalError::from_response("", response).into()
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            // 1. Extraire le header Authorization (format: "Bearer <token>")
            let auth_header = match req.headers().get("Authorization") {
                Some(header) => header,
                None => {
                    return Err(auth_error(HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "Access token required"
                    }))));
                }
            };

            let auth_str = match auth_header.to_str() {
                Ok(s) => s,
                Err(_) => {
                    return Err(auth_error(HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "Invalid Authorization header"
                    }))));
                }
            };

            let token = match auth_str.strip_prefix("Bearer ") {
                Some(token) => token,
                None => {
                    return Err(auth_error(HttpResponse::Unauthorized().json(serde_json::json!({
                        "error": "Invalid Authorization format (expected: Bearer <token>)"
                    }))));
                }
            };

            // 2. Vérifier le token JWT (403 si invalide ou expiré)
            let claims = match jwt::verify_token(token) {
                Ok(claims) => claims,
                Err(_) => {
                    return Err(auth_error(HttpResponse::Forbidden().json(serde_json::json!({
                        "error": "Invalid or expired token"
                    }))));
                }
            };

            // 3. Charger l'utilisateur référencé par le token
            let db = match req.app_data::<web::Data<DatabaseConnection>>() {
                Some(db) => db.clone(),
                None => {
                    return Err(auth_error(HttpResponse::InternalServerError().json(
                        serde_json::json!({ "error": "Database not configured" }),
                    )));
                }
            };

            match Users::find_by_id(claims.sub.clone()).one(db.get_ref()).await {
                Ok(Some(user)) => Ok(AuthUser {
                    user_id: user.id,
                    email: user.email,
                    role: user.role,
                }),
                Ok(None) => {
                    // 4. Le token est valide mais l'utilisateur a disparu:
                    //    provisionner silencieusement un guest et réémettre
                    //    un token pour la nouvelle identité. La requête
                    //    continue normalement sous cette identité.
                    let guest_id = Uuid::new_v4().to_string();
                    let guest_email = format!("guest_{}@telegramsecrets.local", &guest_id[..8]);

                    let new_user = UserActiveModel {
                        id: Set(guest_id),
                        email: Set(guest_email),
                        password_hash: Set(None),
                        role: Set(Role::Guest),
                        created_at: Set(Utc::now()),
                    };

                    let user = match new_user.insert(db.get_ref()).await {
                        Ok(user) => user,
                        Err(e) => {
                            return Err(auth_error(HttpResponse::InternalServerError().json(
                                serde_json::json!({
                                    "error": format!("Failed to provision guest user: {}", e)
                                }),
                            )));
                        }
                    };

                    let new_token = match jwt::generate_token(&user.id, &user.email, user.role) {
                        Ok(token) => token,
                        Err(e) => {
                            return Err(auth_error(HttpResponse::InternalServerError().json(
                                serde_json::json!({ "error": e }),
                            )));
                        }
                    };

                    req.extensions_mut().insert(NewToken(new_token));

                    Ok(AuthUser {
                        user_id: user.id,
                        email: user.email,
                        role: user.role,
                    })
                }
                Err(e) => Err(auth_error(HttpResponse::InternalServerError().json(
                    serde_json::json!({ "error": format!("Database error: {}", e) }),
                ))),
            }
        })
    }
}

/// Extracteur pour les routes d'administration.
/// Exécute AuthUser puis exige le rôle ADMIN.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequest for AdminUser {
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();
        Box::pin(async move {
            let user = AuthUser::from_request(&req, &mut Payload::None).await?;

            if user.role != Role::Admin {
                return Err(auth_error(HttpResponse::Forbidden().json(serde_json::json!({
                    "error": "Admin access required"
                }))));
            }

            Ok(AdminUser(user))
        })
    }
}
