use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;

use crate::models::PublicUser;
use crate::services::{
    AccountService, AssetKind, AssetService, Claims, ProfileUpdateRequest, UploadedFile,
    MAX_IMAGE_BYTES,
};
use crate::utils::AppError;

#[utoipa::path(
    get,
    path = "/api/profile",
    tag = "Profile",
    responses(
        (status = 200, description = "Authenticated user's profile", body = PublicUser),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn get_profile(
    user: web::ReqData<Claims>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    log::info!("👤 GET /profile - {}", user.email);
    let profile = accounts.get_profile(&user.email).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    get,
    path = "/api/profile/{id}",
    tag = "Profile",
    params(
        ("id" = String, Path, description = "Account id (24 hex chars)")
    ),
    responses(
        (status = 200, description = "Public profile", body = PublicUser),
        (status = 400, description = "Malformed id"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_profile_by_id(
    path: web::Path<String>,
    accounts: web::Data<AccountService>,
) -> Result<HttpResponse, AppError> {
    let profile = accounts.get_profile_by_id(&path).await?;
    Ok(HttpResponse::Ok().json(profile))
}

#[utoipa::path(
    post,
    path = "/api/profile/update-info",
    tag = "Profile",
    request_body = ProfileUpdateRequest,
    responses(
        (status = 200, description = "Profile updated"),
        (status = 400, description = "No valid fields to update"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn update_info(
    user: web::ReqData<Claims>,
    accounts: web::Data<AccountService>,
    request: web::Json<ProfileUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    log::info!("✏️  POST /profile/update-info - {}", user.email);

    accounts.update_profile(&user.email, &request).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Profile updated successfully"
    })))
}

/// Pulls the `image` field out of the form. Reading stops as soon as the
/// payload passes the size limit.
async fn read_image_field(mut payload: Multipart) -> Result<UploadedFile, AppError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to parse form: {}", e)))?
    {
        if field.name() != "image" {
            continue;
        }

        let file_name = field
            .content_disposition()
            .get_filename()
            .unwrap_or_default()
            .to_string();
        let content_type = field.content_type().map(|m| m.to_string());

        let mut bytes = Vec::new();
        while let Some(chunk) = field
            .try_next()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read file: {}", e)))?
        {
            if bytes.len() + chunk.len() > MAX_IMAGE_BYTES {
                return Err(AppError::Validation(
                    "File too large. Maximum size is 5MB".to_string(),
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        return Ok(UploadedFile {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(AppError::Validation("No image file provided".to_string()))
}

async fn upload(
    kind: AssetKind,
    user: web::ReqData<Claims>,
    assets: web::Data<AssetService>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let file = read_image_field(payload).await?;
    let url = assets.upload(&user.email, kind, file).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": kind.success_message(),
        "url": url
    })))
}

#[utoipa::path(
    post,
    path = "/api/profile/upload-image",
    tag = "Profile",
    request_body(content = String, content_type = "multipart/form-data", description = "Form field `image`: jpg, jpeg, png, gif or webp up to 5MB"),
    responses(
        (status = 200, description = "Profile picture stored"),
        (status = 400, description = "Invalid file"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_image(
    user: web::ReqData<Claims>,
    assets: web::Data<AssetService>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("🖼️  POST /profile/upload-image - {}", user.email);
    upload(AssetKind::Profile, user, assets, payload).await
}

#[utoipa::path(
    post,
    path = "/api/profile/upload-cover-image",
    tag = "Profile",
    request_body(content = String, content_type = "multipart/form-data", description = "Form field `image`: jpg, jpeg, png, gif or webp up to 5MB"),
    responses(
        (status = 200, description = "Cover image stored"),
        (status = 400, description = "Invalid file"),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn upload_cover_image(
    user: web::ReqData<Claims>,
    assets: web::Data<AssetService>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    log::info!("🖼️  POST /profile/upload-cover-image - {}", user.email);
    upload(AssetKind::Cover, user, assets, payload).await
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{state, TestState};
    use crate::models::User;
    use crate::test_app;
    use actix_web::{http::StatusCode, test};
    use serde_json::{json, Value};

    const BOUNDARY: &str = "XtmBoundary42";

    fn multipart(file_name: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\n",
                file_name
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
        body
    }

    async fn seeded(state: &TestState) -> String {
        let user = User::new("ana@bu.edu".into(), "Ana".into(), None, "local");
        let id = user.id.to_hex();
        crate::database::UserStore::insert(state.store.as_ref(), &user)
            .await
            .unwrap();
        state.credentials.issue_default("ana@bu.edu", &id).unwrap()
    }

    #[actix_web::test]
    async fn profile_requires_token_and_returns_public_user() {
        let state = state();
        let token = seeded(&state).await;
        let app = test_app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/profile").to_request()).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/profile")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["email"], "ana@bu.edu");
    }

    #[actix_web::test]
    async fn profile_by_id_validates_id() {
        let state = state();
        seeded(&state).await;
        let app = test_app!(state);

        let resp = test::call_service(&app, test::TestRequest::get().uri("/api/profile/zzz").to_request()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let uri = format!("/api/profile/{}", mongodb::bson::oid::ObjectId::new().to_hex());
        let resp = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn update_info_grants_on_completion_and_rejects_empty() {
        let state = state();
        let token = seeded(&state).await;
        let app = test_app!(state);
        let auth = ("Authorization", format!("Bearer {}", token));

        let req = test::TestRequest::post()
            .uri("/api/profile/update-info")
            .insert_header(auth.clone())
            .set_json(json!({}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "no_op");

        let req = test::TestRequest::post()
            .uri("/api/profile/update-info")
            .insert_header(auth)
            .set_json(json!({ "college": "BU", "program": "CS", "yearOfStudy": "3", "skills": ["rust"] }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let user = state.store.snapshot("ana@bu.edu").unwrap();
        assert!(user.is_profile_complete());
        assert_eq!(user.skills, vec!["rust".to_string()]);
        assert_eq!(user.credits, 200);
    }

    #[actix_web::test]
    async fn exe_upload_is_rejected_and_nothing_changes() {
        let state = state();
        let token = seeded(&state).await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/profile/upload-image")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .insert_header((
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart("setup.exe", b"MZ\x90\x00"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "validation_error");

        assert!(state.store.snapshot("ana@bu.edu").unwrap().profile_picture_url.is_empty());
        assert!(state.host.uploads.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn cover_upload_returns_stored_url() {
        let state = state();
        let token = seeded(&state).await;
        let app = test_app!(state);

        let req = test::TestRequest::post()
            .uri("/api/profile/upload-cover-image")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .insert_header((
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            ))
            .set_payload(multipart("cover.png", b"\x89PNG"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["message"], "Cover image uploaded successfully");
        assert_eq!(
            body["url"],
            json!(state.store.snapshot("ana@bu.edu").unwrap().cover_image_url)
        );
    }
}
