use serde::{Deserialize, Serialize};

use super::model::{UpdateUserInput, User};

/// Public view of a user; the password hash is never part of it.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub username: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
        }
    }
}

/// Body of `PUT /users/:id`: email and username are required, password is optional.
#[derive(Deserialize)]
pub struct ReplaceUserRequest {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<ReplaceUserRequest> for UpdateUserInput {
    fn from(r: ReplaceUserRequest) -> Self {
        Self {
            email: Some(r.email),
            username: Some(r.username),
            password: r.password,
        }
    }
}
