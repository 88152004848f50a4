use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::services::AccountService;
use crate::utils::AppError;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Case-insensitive substring of name or email
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Matching users as `{data, count}`"),
        (status = 500, description = "Store unavailable")
    )
)]
pub async fn list_users(
    accounts: web::Data<AccountService>,
    query: web::Query<ListUsersQuery>,
) -> Result<HttpResponse, AppError> {
    log::info!("📋 GET /users - q: {:?}", query.q);

    let users = accounts.list_users(query.q.as_deref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": users.len(),
        "data": users
    })))
}

#[utoipa::path(
    delete,
    path = "/api/admin/delete/{id}",
    tag = "Users",
    params(
        ("id" = String, Path, description = "Account id (24 hex chars)")
    ),
    responses(
        (status = 200, description = "Account deleted"),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    path: web::Path<String>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    log::info!("🗑️  DELETE /admin/delete/{}", path);

    accounts.delete_account(&path).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "User deleted successfully"
    })))
}
