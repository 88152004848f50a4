use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::{AppError, AuthError};

// JWT Claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Claims {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub sub: String, // account id (hex)
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

lazy_static! {
    static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Emails are stored and compared in this form.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Password hashing and session tokens. Built once at startup and shared.
pub struct CredentialService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    token_ttl: Duration,
    bcrypt_cost: u32,
    dummy_hash: String,
}

impl CredentialService {
    pub fn new(secret: &str, token_ttl: Duration, bcrypt_cost: u32) -> Result<Self, AppError> {
        // Same cost as real hashes so a miss costs as much as a hit
        let dummy_hash = bcrypt::hash(Uuid::new_v4().to_string(), bcrypt_cost)
            .map_err(|e| AppError::Config(format!("BCRYPT_COST rejected: {}", e)))?;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            token_ttl,
            bcrypt_cost,
            dummy_hash,
        })
    }

    pub async fn hash_password(&self, plain: &str) -> Result<String, AppError> {
        let plain = plain.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || bcrypt::hash(plain, cost))
            .await
            .map_err(|e| AppError::Hashing(e.to_string()))?
            .map_err(|e| AppError::Hashing(e.to_string()))
    }

    /// `None` (OAuth-only account or unknown email) and malformed hashes are
    /// checked against the dummy hash and report `false`.
    pub async fn verify_password(&self, hash: Option<&str>, plain: &str) -> bool {
        let plain = plain.to_string();
        let hash = hash.map(str::to_string);
        let dummy = self.dummy_hash.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            if let Some(hash) = hash {
                if let Ok(valid) = bcrypt::verify(&plain, &hash) {
                    return valid;
                }
            }
            let _ = bcrypt::verify(&plain, &dummy);
            false
        })
        .await;

        match outcome {
            Ok(valid) => valid,
            Err(e) => {
                log::error!("❌ Password verification task failed: {}", e);
                false
            }
        }
    }

    pub fn issue_token(&self, email: &str, sub: &str, ttl: Duration) -> Result<String, AppError> {
        let iat = Utc::now().timestamp();
        let exp = i64::try_from(ttl.as_secs())
            .ok()
            .and_then(|secs| iat.checked_add(secs))
            .ok_or_else(|| AppError::Config(format!("token lifetime too large: {:?}", ttl)))?;
        let claims = Claims {
            email: email.to_string(),
            sub: sub.to_string(),
            iat,
            exp,
            jti: Uuid::new_v4().to_string(),
        };
        self.sign(&claims)
    }

    pub fn issue_default(&self, email: &str, sub: &str) -> Result<String, AppError> {
        self.issue_token(email, sub, self.token_ttl)
    }

    fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Failed to generate token: {}", e)))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Malformed,
            })?;

        if claims.email.trim().is_empty() {
            return Err(AuthError::MissingClaim);
        }
        Ok(claims)
    }
}
