use utoipa::OpenApi;
use utoipa::openapi::security::{SecurityScheme, HttpAuthScheme, HttpBuilder};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "TradeMinutes User Service API",
        version = "1.0.0",
        description = "Accounts, sessions, profiles and time-credit balances for TradeMinutes.\n\n**Authentication:** endpoints marked with a lock require `Authorization: Bearer <token>`.\n\n**Errors:** every failure returns `{\"success\": false, \"error\": \"<reason>\", \"message\": \"...\"}`."
    ),
    paths(
        // Auth
        crate::api::auth::register,
        crate::api::auth::login,
        crate::api::auth::oauth,

        // Credits
        crate::api::auth::update_credits,
        crate::api::auth::deduct_credits,

        // Profile
        crate::api::profile::get_profile,
        crate::api::profile::get_profile_by_id,
        crate::api::profile::update_info,
        crate::api::profile::upload_image,
        crate::api::profile::upload_cover_image,

        // Users
        crate::api::users::list_users,
        crate::api::users::delete_user,

        // Health
        crate::api::health::health_check,
        crate::api::health::ping,
    ),
    components(
        schemas(
            crate::services::RegisterRequest,
            crate::services::LoginRequest,
            crate::services::OAuthRequest,
            crate::services::AuthResponse,
            crate::services::ProfileUpdateRequest,
            crate::services::UpdateCreditsRequest,
            crate::services::DeductCreditsRequest,
            crate::services::DeductionReceipt,
            crate::models::PublicUser,
            crate::models::ProfileStats,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Auth", description = "Registration, password login and OAuth sign-in. All return a session token and the public user."),
        (name = "Credits", description = "Setting and spending the per-user credit balance."),
        (name = "Profile", description = "Profile reads, partial updates and image uploads."),
        (name = "Users", description = "Directory listing and administrative deletion."),
        (name = "Health", description = "Liveness endpoints."),
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("Token from /api/auth/login, /register or /oauth"))
                        .build()
                ),
            );
        }
    }
}
