use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Credits every account starts with, and the value the one-time
/// profile-completion grant sets the balance to.
pub const STARTING_CREDITS: i64 = 200;

/// Activity summary shown on a profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileStats {
    pub tasks_completed: i64,
    pub hours_given: f64,
    pub hours_received: f64,
    pub rating: f64,
}

impl ProfileStats {
    pub fn is_empty(&self) -> bool {
        *self == ProfileStats::default()
    }
}

/// Stored user document. Missing keys decode to empty values so older
/// documents stay readable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>, // None for OAuth-only accounts
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub program: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub college: String,
    #[serde(rename = "yearOfStudy", default)]
    pub year_of_study: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub achievements: Vec<String>,
    #[serde(default)]
    pub stats: ProfileStats,
    #[serde(rename = "profilePictureURL", default)]
    pub profile_picture_url: String,
    #[serde(rename = "coverImageURL", default)]
    pub cover_image_url: String,
    #[serde(default)]
    pub credits: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(rename = "createdAt", default)]
    pub created_at: i64,
}

impl User {
    pub fn new(email: String, name: String, password: Option<String>, provider: &str) -> Self {
        Self {
            id: ObjectId::new(),
            email,
            password,
            name,
            program: String::new(),
            location: String::new(),
            college: String::new(),
            year_of_study: String::new(),
            bio: String::new(),
            skills: Vec::new(),
            achievements: Vec::new(),
            stats: ProfileStats::default(),
            profile_picture_url: String::new(),
            cover_image_url: String::new(),
            credits: STARTING_CREDITS,
            provider: Some(provider.to_string()),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    pub fn is_profile_complete(&self) -> bool {
        profile_complete(&self.college, &self.program, &self.year_of_study)
    }
}

/// Completeness is always derived from these three fields, never stored.
pub fn profile_complete(college: &str, program: &str, year_of_study: &str) -> bool {
    !college.trim().is_empty() && !program.trim().is_empty() && !year_of_study.trim().is_empty()
}

/// What clients see of an account. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PublicUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: String,
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
    #[serde(rename = "coverImageURL")]
    pub cover_image_url: String,
    pub credits: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id.to_hex(),
            email: user.email,
            name: user.name,
            program: user.program,
            location: user.location,
            college: user.college,
            year_of_study: user.year_of_study,
            bio: user.bio,
            skills: user.skills,
            achievements: user.achievements,
            stats: user.stats,
            profile_picture_url: user.profile_picture_url,
            cover_image_url: user.cover_image_url,
            credits: user.credits,
            provider: user.provider,
            created_at: user.created_at,
        }
    }
}
