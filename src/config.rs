use std::env;
use std::time::Duration;

use crate::utils::AppError;

/// Credentials for the remote image host. Only present when all three
/// variables are set.
#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mongo_uri: String,
    pub db_name: String,
    pub users_collection: String,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub bcrypt_cost: u32,
    pub store_timeout: Duration,
    pub store_list_timeout: Duration,
    pub cloudinary: Option<CloudinaryConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Config("JWT_SECRET must be set".to_string()))?;

        let cloudinary = match (
            non_empty_var("CLOUDINARY_CLOUD_NAME"),
            non_empty_var("CLOUDINARY_API_KEY"),
            non_empty_var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_var("PORT", 8080)?,
            mongo_uri: env::var("MONGO_URI")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            db_name: env::var("DB_NAME").unwrap_or_else(|_| "trademinutes".to_string()),
            users_collection: env::var("USERS_COLLECTION").unwrap_or_else(|_| "users".to_string()),
            jwt_secret,
            token_ttl: ttl_from_hours(parse_var("JWT_TTL_HOURS", 24 * 7)?)?,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            store_timeout: Duration::from_secs(parse_var("STORE_TIMEOUT_SECS", 5)?),
            store_list_timeout: Duration::from_secs(parse_var("STORE_LIST_TIMEOUT_SECS", 10)?),
            cloudinary,
        })
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Token lifetimes must fit in a signed `exp` claim.
fn ttl_from_hours(hours: u64) -> Result<Duration, AppError> {
    hours
        .checked_mul(3600)
        .filter(|secs| i64::try_from(*secs).is_ok())
        .map(Duration::from_secs)
        .ok_or_else(|| AppError::Config(format!("JWT_TTL_HOURS is too large: {}", hours)))
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_var_falls_back_to_default() {
        let port: u16 = parse_var("TRADEMINUTES_TEST_UNSET_PORT", 8080).unwrap();
        assert_eq!(port, 8080);
    }

    #[test]
    fn parse_var_rejects_garbage() {
        env::set_var("TRADEMINUTES_TEST_BAD_COST", "twelve");
        let err = parse_var::<u32>("TRADEMINUTES_TEST_BAD_COST", 12).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        env::remove_var("TRADEMINUTES_TEST_BAD_COST");
    }

    #[test]
    fn huge_token_ttl_is_a_config_error() {
        assert_eq!(ttl_from_hours(2).unwrap(), Duration::from_secs(7200));
        assert!(matches!(ttl_from_hours(u64::MAX), Err(AppError::Config(_))));
        assert!(matches!(ttl_from_hours(u64::MAX / 3600), Err(AppError::Config(_))));
    }
}
