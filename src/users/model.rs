use std::fmt;

use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::error::{Operation, StorageError};

/// A registered user as the rest of the service sees it.
///
/// `id` is the external form of the identifier: the lowercase hex encoding of
/// the store's `ObjectId`. It is empty until the store assigns one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String, // argon2 PHC string, never leaves the service
}

/// Request body for user creation.
#[derive(Clone, Deserialize)]
pub struct CreateUserInput {
    pub email: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for CreateUserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUserInput")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Fields to change on an existing user; `None` leaves the field as stored.
#[derive(Clone, Default, Deserialize)]
pub struct UpdateUserInput {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl fmt::Debug for UpdateUserInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateUserInput")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Stored shape of a user. Empty strings are left out of the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(rename = "password", default, skip_serializing_if = "String::is_empty")]
    pub password_hash: String,
}

impl UserDocument {
    /// Document for `user` without its identifier, as used for inserts and `$set`.
    pub fn without_id(user: &User) -> Self {
        Self {
            id: None,
            email: user.email.clone(),
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
        }
    }
}

impl From<UserDocument> for User {
    fn from(d: UserDocument) -> Self {
        Self {
            id: d.id.map(|oid| oid.to_hex()).unwrap_or_default(),
            email: d.email,
            username: d.username,
            password_hash: d.password_hash,
        }
    }
}

/// Converts an external identifier into the store's `ObjectId`.
///
/// This runs before any I/O so malformed identifiers never reach the database.
pub fn parse_id(op: Operation, id: &str) -> Result<ObjectId, StorageError> {
    ObjectId::parse_str(id).map_err(|source| StorageError::InvalidIdentifier {
        op,
        id: id.to_owned(),
        source,
    })
}
