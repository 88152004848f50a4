use std::future::IntoFuture;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document},
    error::{ErrorKind, WriteFailure},
    options::ReturnDocument,
    Collection,
};
use tokio::time::error::Elapsed;

use crate::{
    models::{ProfileStats, User},
    utils::AppError,
};

/// Which account a write or read targets.
#[derive(Debug, Clone, PartialEq)]
pub enum UserKey {
    Email(String),
    Id(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserFilter {
    pub key: UserKey,
    /// Match only while at least one of college / program / yearOfStudy is
    /// still empty or missing.
    pub profile_incomplete: bool,
}

impl UserFilter {
    pub fn by_email(email: &str) -> Self {
        Self {
            key: UserKey::Email(email.to_string()),
            profile_incomplete: false,
        }
    }

    pub fn by_id(id: ObjectId) -> Self {
        Self {
            key: UserKey::Id(id),
            profile_incomplete: false,
        }
    }

    pub fn profile_still_incomplete(mut self) -> Self {
        self.profile_incomplete = true;
        self
    }

    fn to_document(&self) -> Document {
        let mut filter = match &self.key {
            UserKey::Email(email) => doc! { "email": email },
            UserKey::Id(id) => doc! { "_id": *id },
        };
        if self.profile_incomplete {
            // `null` also matches documents where the key is absent; the
            // regex catches whitespace-only values
            let blank = |field: &str| {
                vec![
                    doc! { field: { "$in": ["", Bson::Null] } },
                    doc! { field: { "$regex": r"^\s*$" } },
                ]
            };
            let clauses: Vec<Document> = ["college", "program", "yearOfStudy"]
                .into_iter()
                .flat_map(blank)
                .collect();
            filter.insert("$or", clauses);
        }
        filter
    }

    pub(crate) fn matches(&self, user: &User) -> bool {
        let key_matches = match &self.key {
            UserKey::Email(email) => user.email == *email,
            UserKey::Id(id) => user.id == *id,
        };
        key_matches && (!self.profile_incomplete || !user.is_profile_complete())
    }
}

/// Sparse patch: only `Some` fields are written, everything else is left as
/// stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub program: Option<String>,
    pub location: Option<String>,
    pub college: Option<String>,
    pub year_of_study: Option<String>,
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub achievements: Option<Vec<String>>,
    pub stats: Option<ProfileStats>,
    pub profile_picture_url: Option<String>,
    pub cover_image_url: Option<String>,
    pub credits: Option<i64>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        *self == UserUpdate::default()
    }

    pub fn to_set_document(&self) -> Result<Document, AppError> {
        let mut set = Document::new();
        let strings = [
            ("name", &self.name),
            ("program", &self.program),
            ("location", &self.location),
            ("college", &self.college),
            ("yearOfStudy", &self.year_of_study),
            ("bio", &self.bio),
            ("profilePictureURL", &self.profile_picture_url),
            ("coverImageURL", &self.cover_image_url),
        ];
        for (key, value) in strings {
            if let Some(value) = value {
                set.insert(key, value.clone());
            }
        }
        if let Some(skills) = &self.skills {
            set.insert("skills", skills.clone());
        }
        if let Some(achievements) = &self.achievements {
            set.insert("achievements", achievements.clone());
        }
        if let Some(stats) = &self.stats {
            let stats = mongodb::bson::to_bson(stats)
                .map_err(|e| AppError::Internal(format!("stats encoding: {}", e)))?;
            set.insert("stats", stats);
        }
        if let Some(credits) = self.credits {
            set.insert("credits", credits);
        }
        Ok(set)
    }

    /// Applies the patch to an in-memory record.
    pub fn apply_to(&self, user: &mut User) {
        fn put<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        put(&mut user.name, &self.name);
        put(&mut user.program, &self.program);
        put(&mut user.location, &self.location);
        put(&mut user.college, &self.college);
        put(&mut user.year_of_study, &self.year_of_study);
        put(&mut user.bio, &self.bio);
        put(&mut user.skills, &self.skills);
        put(&mut user.achievements, &self.achievements);
        put(&mut user.stats, &self.stats);
        put(&mut user.profile_picture_url, &self.profile_picture_url);
        put(&mut user.cover_image_url, &self.cover_image_url);
        put(&mut user.credits, &self.credits);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    Applied { remaining: i64 },
    Insufficient { balance: i64 },
    Missing,
}

/// Typed contract over the document store. Implementations must bound every
/// call and report `StoreTimeout` / `StoreUnavailable` instead of blocking.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict` when the email is already taken.
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    /// Returns whether a record matched the filter.
    async fn update_fields(&self, filter: &UserFilter, update: &UserUpdate)
        -> Result<bool, AppError>;

    /// Decrements iff the current balance covers `amount`, as one atomic step.
    async fn deduct_credits(&self, id: &ObjectId, amount: i64) -> Result<DeductOutcome, AppError>;

    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError>;

    /// Case-insensitive substring match on name or email.
    async fn find_all(&self, text: Option<&str>) -> Result<Vec<User>, AppError>;
}

pub struct MongoUserStore {
    collection: Collection<User>,
    timeout: Duration,
    list_timeout: Duration,
}

impl MongoUserStore {
    pub fn new(collection: Collection<User>, timeout: Duration, list_timeout: Duration) -> Self {
        Self {
            collection,
            timeout,
            list_timeout,
        }
    }

    async fn bounded<F, T>(&self, op: &'static str, limit: Duration, fut: F) -> Result<T, AppError>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        relabel(op, limit, tokio::time::timeout(limit, fut).await)
    }
}

/// Maps a bounded driver call onto the service's store errors.
fn relabel<T>(
    op: &'static str,
    limit: Duration,
    outcome: Result<mongodb::error::Result<T>, Elapsed>,
) -> Result<T, AppError> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) if is_duplicate_key(&e) => {
            Err(AppError::Conflict("User already exists".to_string()))
        }
        Ok(Err(e)) => {
            log::error!("❌ MongoDB {} failed: {}", op, e);
            Err(AppError::StoreUnavailable(op))
        }
        Err(_) => {
            log::warn!("⏱️  MongoDB {} exceeded {:?}", op, limit);
            Err(AppError::StoreTimeout(op))
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == 11000
    )
}

/// Builds the `$or` name/email filter; the text is matched literally.
pub fn text_filter(text: Option<&str>) -> Document {
    match text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => {
            let pattern = regex::escape(text);
            doc! {
                "$or": [
                    { "name": { "$regex": &pattern, "$options": "i" } },
                    { "email": { "$regex": &pattern, "$options": "i" } },
                ]
            }
        }
        None => doc! {},
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.bounded(
            "find_by_email",
            self.timeout,
            self.collection.find_one(doc! { "email": email }),
        )
        .await
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, AppError> {
        self.bounded(
            "find_by_id",
            self.timeout,
            self.collection.find_one(doc! { "_id": *id }),
        )
        .await
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        self.bounded("insert", self.timeout, self.collection.insert_one(user))
            .await
            .map(|_| ())
    }

    async fn update_fields(
        &self,
        filter: &UserFilter,
        update: &UserUpdate,
    ) -> Result<bool, AppError> {
        if update.is_empty() {
            return Err(AppError::NoOp);
        }
        let set = update.to_set_document()?;
        let result = self
            .bounded(
                "update_fields",
                self.timeout,
                self.collection
                    .update_one(filter.to_document(), doc! { "$set": set }),
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn deduct_credits(&self, id: &ObjectId, amount: i64) -> Result<DeductOutcome, AppError> {
        let updated = self
            .bounded(
                "deduct_credits",
                self.timeout,
                self.collection
                    .find_one_and_update(
                        doc! { "_id": *id, "credits": { "$gte": amount } },
                        doc! { "$inc": { "credits": -amount } },
                    )
                    .return_document(ReturnDocument::After),
            )
            .await?;

        if let Some(user) = updated {
            return Ok(DeductOutcome::Applied {
                remaining: user.credits,
            });
        }

        // Nothing matched: either the account is gone or the balance is short.
        Ok(match self.find_by_id(id).await? {
            Some(user) => DeductOutcome::Insufficient {
                balance: user.credits,
            },
            None => DeductOutcome::Missing,
        })
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError> {
        let result = self
            .bounded(
                "delete",
                self.list_timeout,
                self.collection.delete_one(doc! { "_id": *id }),
            )
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn find_all(&self, text: Option<&str>) -> Result<Vec<User>, AppError> {
        let filter = text_filter(text);
        let collection = &self.collection;
        self.bounded("find_all", self.list_timeout, async move {
            let cursor = collection.find(filter).await?;
            cursor.try_collect::<Vec<User>>().await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_document_only_carries_present_fields() {
        let update = UserUpdate {
            bio: Some("hi".into()),
            credits: Some(200),
            ..Default::default()
        };
        let set = update.to_set_document().unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get_str("bio").unwrap(), "hi");
        assert_eq!(set.get_i64("credits").unwrap(), 200);
    }

    #[test]
    fn guarded_filter_requires_an_empty_completion_field() {
        let filter = UserFilter::by_email("a@b.com").profile_still_incomplete();
        let doc = filter.to_document();
        assert_eq!(doc.get_str("email").unwrap(), "a@b.com");
        let clauses = doc.get_array("$or").unwrap();
        assert_eq!(clauses.len(), 6);
        let year = clauses[5].as_document().unwrap().get_document("yearOfStudy").unwrap();
        assert_eq!(year.get_str("$regex").unwrap(), r"^\s*$");
    }

    #[test]
    fn guard_agrees_with_derived_completeness_on_blank_values() {
        let mut user = User::new("a@b.com".into(), "A".into(), None, "local");
        user.college = "BU".into();
        user.program = "CS".into();
        user.year_of_study = "   ".into();
        let filter = UserFilter::by_email("a@b.com").profile_still_incomplete();
        assert!(filter.matches(&user));

        user.year_of_study = "3".into();
        assert!(!filter.matches(&user));
    }

    async fn elapsed() -> Elapsed {
        tokio::time::timeout(Duration::from_millis(1), std::future::pending::<()>())
            .await
            .unwrap_err()
    }

    #[tokio::test]
    async fn timeout_becomes_store_timeout() {
        let outcome: Result<mongodb::error::Result<()>, Elapsed> = Err(elapsed().await);
        let err = relabel("find_by_email", Duration::from_millis(1), outcome).unwrap_err();
        assert!(matches!(err, AppError::StoreTimeout("find_by_email")));
    }

    #[test]
    fn driver_failure_becomes_store_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let outcome: Result<mongodb::error::Result<()>, Elapsed> =
            Ok(Err(mongodb::error::Error::from(io)));
        let err = relabel("insert", Duration::from_secs(5), outcome).unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable("insert")));
        // Driver text stays in the log
        assert!(!err.to_string().contains("reset by peer"));
    }

    #[test]
    fn duplicate_key_becomes_conflict() {
        let write_error: mongodb::error::WriteError = mongodb::bson::from_document(doc! {
            "code": 11000,
            "errmsg": "E11000 duplicate key error collection: users index: email_1",
        })
        .unwrap();
        let dup = mongodb::error::Error::from(ErrorKind::Write(WriteFailure::WriteError(
            write_error,
        )));
        assert!(is_duplicate_key(&dup));

        let outcome: Result<mongodb::error::Result<()>, Elapsed> = Ok(Err(dup));
        let err = relabel("insert", Duration::from_secs(5), outcome).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn successful_call_passes_through() {
        let outcome: Result<mongodb::error::Result<u8>, Elapsed> = Ok(Ok(7));
        assert_eq!(relabel("find_all", Duration::from_secs(10), outcome).unwrap(), 7);
    }

    #[test]
    fn text_filter_escapes_regex_metacharacters() {
        let doc = text_filter(Some("a.b+"));
        let clauses = doc.get_array("$or").unwrap();
        let name = clauses[0].as_document().unwrap().get_document("name").unwrap();
        assert_eq!(name.get_str("$regex").unwrap(), r"a\.b\+");
        assert_eq!(name.get_str("$options").unwrap(), "i");
    }

    #[test]
    fn blank_text_filter_matches_everything() {
        assert!(text_filter(Some("   ")).is_empty());
        assert!(text_filter(None).is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn mongo_store_enforces_unique_email() {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into());
        let mongo = crate::database::MongoDB::new(&uri, "trademinutes_test").await.unwrap();
        let name = format!("users_{}", ObjectId::new().to_hex());
        mongo.ensure_indexes(&name).await;
        let store = MongoUserStore::new(
            mongo.collection(&name),
            Duration::from_secs(5),
            Duration::from_secs(10),
        );

        let user = User::new("dup@b.com".into(), "D".into(), None, "local");
        store.insert(&user).await.unwrap();
        let again = User::new("dup@b.com".into(), "D".into(), None, "local");
        assert!(matches!(store.insert(&again).await, Err(AppError::Conflict(_))));

        mongo.collection::<User>(&name).drop().await.unwrap();
    }
}
