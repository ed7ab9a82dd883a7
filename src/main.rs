mod models;
mod routes;
mod db;
mod services;
mod utils;
mod middleware;

use actix_cors::Cors;
use actix_web::dev::Service as _;
use actix_web::http::header::{HeaderName, HeaderValue};
use actix_web::{web, App, HttpMessage, HttpServer};

use crate::middleware::{GeoDb, NewToken};
use crate::services::pushinpay::PushinPayClient;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    println!("🔌 Connecting to database...");
    let db = db::establish_connection()
        .await
        .expect("Failed to connect to database");
    println!("✅ Database connected!");

    let geo_db = web::Data::new(GeoDb::load());
    let gateway = web::Data::new(PushinPayClient::from_env());

    let frontend_url = std::env::var("FRONTEND_URL")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    println!("🚀 Starting server on http://0.0.0.0:{}", port);
    println!("🔗 Frontend URL: {}", frontend_url);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_url)
            .allow_any_method()
            .allow_any_header()
            .expose_headers(["x-new-token"])
            .supports_credentials();

        App::new()
            .wrap(cors)
            .app_data(web::Data::new(db.clone()))
            .app_data(geo_db.clone())
            .app_data(gateway.clone())
            // Propage vers le client le token réémis lors de
            // l'auto-provisionnement d'une identité guest
            .wrap_fn(|req, srv| {
                let fut = srv.call(req);
                async move {
                    let mut res = fut.await?;

                    let new_token = res
                        .request()
                        .extensions()
                        .get::<NewToken>()
                        .map(|t| t.0.clone());

                    if let Some(token) = new_token {
                        if let Ok(value) = HeaderValue::from_str(&token) {
                            res.headers_mut()
                                .insert(HeaderName::from_static("x-new-token"), value);
                        }
                    }

                    Ok(res)
                }
            })
            .configure(routes::configure_routes)
    })
        .bind(("0.0.0.0", port))?
        .run()
        .await
}
