use std::sync::Mutex;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;

use super::user_store::{DeductOutcome, UserFilter, UserStore, UserUpdate};
use crate::{models::User, utils::AppError};

/// In-process `UserStore` for tests. Each call holds the lock for its whole
/// read-modify-write, which gives the same atomicity as the document store.
#[derive(Default)]
pub struct MemoryUserStore {
    users: Mutex<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn snapshot(&self, email: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.snapshot(email))
    }

    async fn find_by_id(&self, id: &ObjectId) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == *id)
            .cloned())
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.email == user.email) {
            return Err(AppError::Conflict("User already exists".to_string()));
        }
        users.push(user.clone());
        Ok(())
    }

    async fn update_fields(
        &self,
        filter: &UserFilter,
        update: &UserUpdate,
    ) -> Result<bool, AppError> {
        if update.is_empty() {
            return Err(AppError::NoOp);
        }
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| filter.matches(u)) {
            Some(user) => {
                update.apply_to(user);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn deduct_credits(&self, id: &ObjectId, amount: i64) -> Result<DeductOutcome, AppError> {
        let mut users = self.users.lock().unwrap();
        Ok(match users.iter_mut().find(|u| u.id == *id) {
            Some(user) if user.credits >= amount => {
                user.credits -= amount;
                DeductOutcome::Applied {
                    remaining: user.credits,
                }
            }
            Some(user) => DeductOutcome::Insufficient {
                balance: user.credits,
            },
            None => DeductOutcome::Missing,
        })
    }

    async fn delete(&self, id: &ObjectId) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.id != *id);
        Ok(users.len() < before)
    }

    async fn find_all(&self, text: Option<&str>) -> Result<Vec<User>, AppError> {
        let needle = text
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| match &needle {
                Some(n) => u.name.to_lowercase().contains(n) || u.email.to_lowercase().contains(n),
                None => true,
            })
            .cloned()
            .collect())
    }
}
