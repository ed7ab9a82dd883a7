pub mod health;
pub mod auth;
pub mod products;
pub mod payments;
pub mod settings;
pub mod popup;
pub mod admin;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(products::product_routes)
            .configure(payments::payment_routes)
            .configure(settings::settings_routes)
            .configure(popup::popup_routes)
            .configure(admin::admin_routes)
    );
}
