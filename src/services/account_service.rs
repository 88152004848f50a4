use std::sync::Arc;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{
    database::{DeductOutcome, UserFilter, UserStore, UserUpdate},
    models::{profile_complete, ProfileStats, PublicUser, User, STARTING_CREDITS},
    services::credential_service::{is_valid_email, normalize_email, CredentialService},
    utils::AppError,
};

const OAUTH_ATTEMPTS: usize = 3;

// Request/Response structures
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct OAuthRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub provider: Option<String>, // "github", "google", ...
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: PublicUser,
}

/// Partial profile edit. Empty strings, empty lists and all-zero stats mean
/// "leave as is".
#[derive(Debug, Default, Deserialize, utoipa::ToSchema)]
#[serde(default)]
pub struct ProfileUpdateRequest {
    pub name: String,
    pub program: String,
    pub location: String,
    pub college: String,
    #[serde(rename = "yearOfStudy")]
    pub year_of_study: String,
    pub bio: String,
    pub skills: Vec<String>,
    pub achievements: Vec<String>,
    pub stats: ProfileStats,
    #[serde(rename = "profilePictureURL")]
    pub profile_picture_url: String,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateCreditsRequest {
    pub credits: i64,
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct DeductCreditsRequest {
    #[serde(rename = "userId", default)]
    pub user_id: String,
    pub credits: i64,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
pub struct DeductionReceipt {
    pub deducted: i64,
    pub remaining: i64,
    pub reason: String,
}

fn present(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl ProfileUpdateRequest {
    fn to_update(&self) -> UserUpdate {
        UserUpdate {
            name: present(&self.name),
            program: present(&self.program),
            location: present(&self.location),
            college: present(&self.college),
            year_of_study: present(&self.year_of_study),
            bio: present(&self.bio),
            skills: (!self.skills.is_empty()).then(|| self.skills.clone()),
            achievements: (!self.achievements.is_empty()).then(|| self.achievements.clone()),
            stats: (!self.stats.is_empty()).then(|| self.stats.clone()),
            profile_picture_url: present(&self.profile_picture_url),
            ..Default::default()
        }
    }
}

pub fn parse_account_id(raw: &str) -> Result<ObjectId, AppError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| AppError::Validation("Invalid user ID".to_string()))
}

/// Registration, sign-in and every mutation of an account's credits and
/// profile. All concurrency control is delegated to the store's atomic
/// writes.
pub struct AccountService {
    store: Arc<dyn UserStore>,
    credentials: Arc<CredentialService>,
}

impl AccountService {
    pub fn new(store: Arc<dyn UserStore>, credentials: Arc<CredentialService>) -> Self {
        Self { store, credentials }
    }

    fn auth_response(&self, user: User) -> Result<AuthResponse, AppError> {
        let token = self
            .credentials
            .issue_default(&user.email, &user.id.to_hex())?;
        Ok(AuthResponse {
            token,
            user: user.into(),
        })
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, AppError> {
        if request.email.trim().is_empty()
            || request.password.is_empty()
            || request.name.trim().is_empty()
        {
            return Err(AppError::Validation(
                "Email, password and name are required".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        if !is_valid_email(&email) {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User already exists".to_string()));
        }

        let hashed = self.credentials.hash_password(&request.password).await?;
        let user = User::new(email, request.name.trim().to_string(), Some(hashed), "local");

        // The unique index still rejects a racing registration here
        self.store.insert(&user).await?;

        log::info!("✅ User registered: {}", user.email);
        self.auth_response(user)
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, AppError> {
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(AppError::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let email = normalize_email(&request.email);
        let user = self.store.find_by_email(&email).await?;
        let hash = user.as_ref().and_then(|u| u.password.as_deref());

        if !self.credentials.verify_password(hash, &request.password).await {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        match user {
            Some(user) => self.auth_response(user),
            None => Err(AppError::Unauthorized("Invalid credentials".to_string())),
        }
    }

    pub async fn oauth_sign_in(&self, request: &OAuthRequest) -> Result<AuthResponse, AppError> {
        if request.email.trim().is_empty() || request.name.trim().is_empty() {
            return Err(AppError::Validation("Email and name are required".to_string()));
        }

        let email = normalize_email(&request.email);
        let provider = request
            .provider
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or("oauth");

        for attempt in 1..=OAUTH_ATTEMPTS {
            if let Some(user) = self.store.find_by_email(&email).await? {
                return self.auth_response(user);
            }

            let user = User::new(email.clone(), request.name.trim().to_string(), None, provider);
            match self.store.insert(&user).await {
                Ok(()) => {
                    log::info!("✅ OAuth account created: {} (provider: {})", email, provider);
                    return self.auth_response(user);
                }
                Err(AppError::Conflict(_)) => {
                    log::warn!(
                        "⚠️  OAuth insert raced for {} (attempt {}/{})",
                        email,
                        attempt,
                        OAUTH_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(
            "Account is being created concurrently, retry".to_string(),
        ))
    }

    pub async fn get_profile(&self, email: &str) -> Result<PublicUser, AppError> {
        self.store
            .find_by_email(email)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn get_profile_by_id(&self, raw_id: &str) -> Result<PublicUser, AppError> {
        let id = parse_account_id(raw_id)?;
        self.store
            .find_by_id(&id)
            .await?
            .map(PublicUser::from)
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Applies a sparse profile edit. Returns `true` when this call performed
    /// the one-time completion grant.
    pub async fn update_profile(
        &self,
        email: &str,
        request: &ProfileUpdateRequest,
    ) -> Result<bool, AppError> {
        let update = request.to_update();
        if update.is_empty() {
            return Err(AppError::NoOp);
        }

        let current = self
            .store
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let was_incomplete = !current.is_profile_complete();
        let merged = |incoming: &Option<String>, stored: &str| -> String {
            incoming.clone().unwrap_or_else(|| stored.to_string())
        };
        let is_now_complete = profile_complete(
            &merged(&update.college, &current.college),
            &merged(&update.program, &current.program),
            &merged(&update.year_of_study, &current.year_of_study),
        );

        let filter = UserFilter::by_email(email);

        if was_incomplete && is_now_complete {
            let granted = UserUpdate {
                credits: Some(STARTING_CREDITS),
                ..update.clone()
            };
            let guarded = filter.clone().profile_still_incomplete();
            if self.store.update_fields(&guarded, &granted).await? {
                log::info!("🎁 Profile completed for {}, credits set to {}", email, STARTING_CREDITS);
                return Ok(true);
            }
            // Another request completed the profile first; write the fields only.
        }

        if self.store.update_fields(&filter, &update).await? {
            Ok(false)
        } else {
            Err(AppError::NotFound("User not found".to_string()))
        }
    }

    pub async fn set_credits(&self, email: &str, amount: i64) -> Result<i64, AppError> {
        if amount < 0 {
            return Err(AppError::InvalidAmount(
                "Credits cannot be negative".to_string(),
            ));
        }

        let update = UserUpdate {
            credits: Some(amount),
            ..Default::default()
        };
        if self.store.update_fields(&UserFilter::by_email(email), &update).await? {
            Ok(amount)
        } else {
            Err(AppError::NotFound("User not found".to_string()))
        }
    }

    pub async fn deduct_credits(
        &self,
        request: &DeductCreditsRequest,
    ) -> Result<DeductionReceipt, AppError> {
        if request.credits <= 0 {
            return Err(AppError::InvalidAmount(
                "Credits to deduct must be positive".to_string(),
            ));
        }
        let id = parse_account_id(&request.user_id)?;

        match self.store.deduct_credits(&id, request.credits).await? {
            DeductOutcome::Applied { remaining } => {
                log::info!(
                    "💳 Deducted {} credits from {} ({})",
                    request.credits,
                    id.to_hex(),
                    request.reason
                );
                Ok(DeductionReceipt {
                    deducted: request.credits,
                    remaining,
                    reason: request.reason.clone(),
                })
            }
            DeductOutcome::Insufficient { balance } => Err(AppError::InsufficientCredits {
                balance,
                requested: request.credits,
            }),
            DeductOutcome::Missing => Err(AppError::NotFound("User not found".to_string())),
        }
    }

    pub async fn list_users(&self, text: Option<&str>) -> Result<Vec<PublicUser>, AppError> {
        let users = self.store.find_all(text).await?;
        Ok(users.into_iter().map(PublicUser::from).collect())
    }

    pub async fn delete_account(&self, raw_id: &str) -> Result<(), AppError> {
        let id = parse_account_id(raw_id)?;
        if self.store.delete(&id).await? {
            log::info!("🗑️  Deleted account {}", id.to_hex());
            Ok(())
        } else {
            Err(AppError::NotFound("User not found".to_string()))
        }
    }
}
