pub mod auth;
pub mod health;
pub mod profile;
pub mod swagger;
pub mod users;

use actix_web::web;

use crate::middleware::AuthMiddleware;
use crate::utils::AppError;

/// Route table shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| AppError::Validation(format!("Invalid request: {}", err)).into()),
    )
    // Health check
    .route("/health", web::get().to(health::health_check))
    .route("/ping", web::get().to(health::ping))
    .service(
        web::scope("/api")
            // Auth endpoints
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(auth::register))
                    .route("/login", web::post().to(auth::login))
                    .route("/oauth", web::post().to(auth::oauth))
                    .route("/github", web::post().to(auth::oauth))
                    .route("/deduct-credits", web::post().to(auth::deduct_credits))
                    // Protected endpoint requiring JWT authentication
                    .service(
                        web::resource("/update-credits")
                            .wrap(AuthMiddleware)
                            .route(web::put().to(auth::update_credits)),
                    ),
            )
            // Profile: everything but the public lookup requires JWT
            .service(
                web::scope("/profile")
                    .service(
                        web::resource("")
                            .wrap(AuthMiddleware)
                            .route(web::get().to(profile::get_profile)),
                    )
                    .service(
                        web::resource("/update-info")
                            .wrap(AuthMiddleware)
                            .route(web::post().to(profile::update_info)),
                    )
                    .service(
                        web::resource("/upload-image")
                            .wrap(AuthMiddleware)
                            .route(web::post().to(profile::upload_image)),
                    )
                    .service(
                        web::resource("/upload-cover-image")
                            .wrap(AuthMiddleware)
                            .route(web::post().to(profile::upload_cover_image)),
                    )
                    .route("/{id}", web::get().to(profile::get_profile_by_id)), // DEVE FICAR POR ÚLTIMO (catch-all)
            )
            .route("/users", web::get().to(users::list_users))
            .route("/admin/delete/{id}", web::delete().to(users::delete_user)),
    );
}
