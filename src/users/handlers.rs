use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tracing::{error, instrument};

use crate::{
    state::AppState,
    users::{
        dto::{ReplaceUserRequest, UserResponse},
        error::StorageError,
        model::{CreateUserInput, UpdateUserInput},
        services::ServiceError,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user)
                .put(replace_user)
                .patch(update_user)
                .delete(delete_user),
        )
}

fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        match self {
            ServiceError::Validation(_) => {
                json_error(StatusCode::BAD_REQUEST, "validation_error", message)
            }
            ServiceError::Storage(StorageError::InvalidIdentifier { .. }) => {
                json_error(StatusCode::BAD_REQUEST, "invalid_id", message)
            }
            ServiceError::Storage(StorageError::NotFound { .. }) => {
                json_error(StatusCode::NOT_FOUND, "not_found", "User not found")
            }
            ServiceError::Storage(StorageError::Conversion { .. }) => {
                error!(error = %message, "inserted id conversion failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "conversion_error", message)
            }
            ServiceError::Storage(StorageError::Persistence { .. }) => {
                error!(error = %message, "storage failure");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message)
            }
            ServiceError::Hashing(_) => {
                error!(error = %message, "password hashing failed");
                json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
            }
        }
    }
}

#[instrument(skip(state))]
pub async fn list_users(
    State(state): State<AppState>,
) -> Result<Json<Vec<UserResponse>>, ServiceError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserInput>,
) -> Result<(StatusCode, HeaderMap, Json<UserResponse>), ServiceError> {
    let user = state.users.create(payload).await?;

    let mut headers = HeaderMap::new();
    // hex ids are always valid header values
    if let Ok(location) = HeaderValue::from_str(&format!("/users/{}", user.id)) {
        headers.insert(header::LOCATION, location);
    }

    Ok((StatusCode::CREATED, headers, Json(user.into())))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ServiceError> {
    let user = state.users.get(&id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn replace_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ReplaceUserRequest>,
) -> Result<Json<UserResponse>, ServiceError> {
    let user = state.users.update(&id, payload.into()).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserInput>,
) -> Result<Json<UserResponse>, ServiceError> {
    let user = state.users.update(&id, payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.users.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
