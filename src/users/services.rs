use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    error::StorageError,
    model::{CreateUserInput, UpdateUserInput, User},
    password::hash_password,
    repo::UserStorage,
};

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to hash password: {0}")]
    Hashing(anyhow::Error),
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> Result<String, ServiceError> {
    let email = raw.trim().to_lowercase();
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ServiceError::Validation("Invalid email".into()));
    }
    Ok(email)
}

fn normalize_username(raw: &str) -> Result<String, ServiceError> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(ServiceError::Validation("Username is required".into()));
    }
    Ok(username.to_string())
}

fn hash_new_password(plain: &str) -> Result<String, ServiceError> {
    if plain.len() < MIN_PASSWORD_LEN {
        warn!("password too short");
        return Err(ServiceError::Validation("Password too short".into()));
    }
    hash_password(plain).map_err(ServiceError::Hashing)
}

/// Business rules between the HTTP handlers and `UserStorage`.
#[derive(Clone)]
pub struct UserService {
    storage: Arc<dyn UserStorage>,
}

impl UserService {
    pub fn new(storage: Arc<dyn UserStorage>) -> Self {
        Self { storage }
    }

    pub async fn create(&self, input: CreateUserInput) -> Result<User, ServiceError> {
        let email = normalize_email(&input.email)?;
        let username = normalize_username(&input.username)?;
        let password_hash = hash_new_password(&input.password)?;

        let mut user = User {
            id: String::new(),
            email,
            username,
            password_hash,
        };
        user.id = self.storage.create(&user).await?;

        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn get(&self, id: &str) -> Result<User, ServiceError> {
        Ok(self.storage.find_one(id).await?)
    }

    /// Every user; unpaginated.
    pub async fn list(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.storage.find_all().await?)
    }

    /// Writes only the supplied fields, so concurrent updates of different
    /// fields do not overwrite each other. Returns the stored user afterwards.
    pub async fn update(&self, id: &str, input: UpdateUserInput) -> Result<User, ServiceError> {
        // empty fields are left out of `$set`
        let mut changes = User {
            id: id.to_string(),
            ..User::default()
        };
        if let Some(email) = input.email {
            changes.email = normalize_email(&email)?;
        }
        if let Some(username) = input.username {
            changes.username = normalize_username(&username)?;
        }
        if let Some(password) = input.password {
            changes.password_hash = hash_new_password(&password)?;
        }

        let has_changes = !(changes.email.is_empty()
            && changes.username.is_empty()
            && changes.password_hash.is_empty());
        if has_changes {
            self.storage.update(&changes).await?;
            info!(user_id = %id, "user updated");
        }

        Ok(self.storage.find_one(id).await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.storage.delete(id).await?;
        info!(user_id = %id, "user deleted");
        Ok(())
    }
}
