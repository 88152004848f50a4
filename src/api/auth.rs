use actix_web::{web, HttpResponse};

use crate::services::{
    AccountService, AuthResponse, Claims, DeductCreditsRequest, LoginRequest, OAuthRequest,
    RegisterRequest, UpdateCreditsRequest,
};
use crate::utils::AppError;

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registration successful", body = AuthResponse),
        (status = 400, description = "Missing or malformed fields"),
        (status = 409, description = "User already exists")
    )
)]
pub async fn register(
    accounts: web::Data<AccountService>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("📝 POST /auth/register - email: {}", request.email);

    let response = accounts.register(&request).await.map_err(|e| {
        log::warn!("❌ Registration failed: {} - {}", request.email, e);
        e
    })?;
    Ok(HttpResponse::Created().json(response))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    accounts: web::Data<AccountService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("🔐 POST /auth/login - email: {}", request.email);

    let response = accounts.login(&request).await.map_err(|e| {
        log::warn!("❌ Login failed: {} - {}", request.email, e);
        e
    })?;
    Ok(HttpResponse::Ok().json(response))
}

/// Also mounted at `/api/auth/github`.
#[utoipa::path(
    post,
    path = "/api/auth/oauth",
    tag = "Auth",
    request_body = OAuthRequest,
    responses(
        (status = 200, description = "Signed in, account created on first use", body = AuthResponse),
        (status = 400, description = "Missing email or name")
    )
)]
pub async fn oauth(
    accounts: web::Data<AccountService>,
    request: web::Json<OAuthRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "🔑 POST /auth/oauth - email: {}, provider: {}",
        request.email,
        request.provider.as_deref().unwrap_or("oauth")
    );

    let response = accounts.oauth_sign_in(&request).await?;
    Ok(HttpResponse::Ok().json(response))
}

#[utoipa::path(
    put,
    path = "/api/auth/update-credits",
    tag = "Credits",
    request_body = UpdateCreditsRequest,
    responses(
        (status = 200, description = "Balance set"),
        (status = 400, description = "Negative amount"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_credits(
    user: web::ReqData<Claims>,
    accounts: web::Data<AccountService>,
    request: web::Json<UpdateCreditsRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("💰 PUT /auth/update-credits - {} -> {}", user.email, request.credits);

    let credits = accounts.set_credits(&user.email, request.credits).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Credits updated successfully",
        "credits": credits
    })))
}

#[utoipa::path(
    post,
    path = "/api/auth/deduct-credits",
    tag = "Credits",
    request_body = DeductCreditsRequest,
    responses(
        (status = 200, description = "Credits deducted"),
        (status = 400, description = "Non-positive amount or malformed id"),
        (status = 402, description = "Insufficient credits"),
        (status = 404, description = "User not found")
    )
)]
pub async fn deduct_credits(
    accounts: web::Data<AccountService>,
    request: web::Json<DeductCreditsRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!(
        "💳 POST /auth/deduct-credits - user: {}, credits: {}",
        request.user_id,
        request.credits
    );

    let receipt = accounts.deduct_credits(&request).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Credits deducted successfully",
        "deducted": receipt.deducted,
        "remaining": receipt.remaining,
        "reason": receipt.reason
    })))
}
