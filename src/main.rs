mod api;
mod config;
mod database;
mod jobs;
mod middleware;
mod models;
mod services;
mod utils;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::database::{MongoDB, MongoUserStore, UserStore};
use crate::services::{
    AccountService, AssetService, CloudinaryClient, CredentialService, DisabledImageHost,
    ImageHost,
};

fn startup_error(e: impl std::fmt::Display) -> std::io::Error {
    log::error!("❌ Startup failed: {}", e);
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(startup_error)?;

    log::info!("🚀 Starting TradeMinutes User Service...");
    log::info!("📊 Database: {} / {}", config.db_name, config.users_collection);

    // Initialize MongoDB connection
    let db = MongoDB::new(&config.mongo_uri, &config.db_name)
        .await
        .map_err(startup_error)?;
    log::info!("✅ MongoDB connected successfully");
    db.ensure_indexes(&config.users_collection).await;

    let store: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(
        db.collection(&config.users_collection),
        config.store_timeout,
        config.store_list_timeout,
    ));

    let credentials = Arc::new(
        CredentialService::new(&config.jwt_secret, config.token_ttl, config.bcrypt_cost)
            .map_err(startup_error)?,
    );

    let host: Arc<dyn ImageHost> = match config.cloudinary.clone() {
        Some(cloudinary) => Arc::new(CloudinaryClient::new(cloudinary).map_err(startup_error)?),
        None => {
            log::warn!("⚠️  Cloudinary not configured, images will be stored inline as base64");
            Arc::new(DisabledImageHost)
        }
    };

    let accounts = web::Data::new(AccountService::new(store.clone(), credentials.clone()));
    let assets = web::Data::new(AssetService::new(store, host));
    let credentials = web::Data::from(credentials);

    let (host_addr, port) = (config.host.clone(), config.port);
    log::info!("🌐 Server starting on {}:{}", host_addr, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host_addr, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host_addr, port);

    // Start HTTP server
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
            ])
            .max_age(3600);

        // Generate OpenAPI specification
        let openapi = api::swagger::ApiDoc::openapi();

        App::new()
            .app_data(accounts.clone())
            .app_data(assets.clone())
            .app_data(credentials.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .configure(api::configure)
    })
    .bind((host_addr.as_str(), port))?
    .run()
    .await
}
