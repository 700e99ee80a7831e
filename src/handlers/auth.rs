use axum::{extract::State, response::Json};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use model::entities::user;
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{verify_password, AuthUser};
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState};

pub const BAD_CREDENTIALS: &str = "用户名或密码错误";

/// Login credentials
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username must not be empty"))]
    pub username: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// A user as seen by its owner
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i32,
    pub username: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Key for the SMS webhook, to be pasted into the iOS shortcut
    pub api_key: String,
    pub created_at: NaiveDateTime,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            phone: model.phone,
            api_key: model.api_key,
            created_at: model.created_at,
        }
    }
}

/// Issued token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: UserResponse,
}

/// Log in with username and password
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = ApiResponse<LoginResponse>),
        (status = 400, description = "Invalid request"),
        (status = 401, description = "Wrong username or password", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(username = %request.username))]
pub async fn login(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<LoginRequest>>,
) -> ApiResult<Json<ApiResponse<LoginResponse>>> {
    trace!("Entering login function");

    let user = match user::Entity::find_by_username(&state.db, &request.username).await? {
        Some(user) if verify_password(&request.password, &user.password_hash) => user,
        Some(_) => {
            warn!("Wrong password for user {}", request.username);
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
        None => {
            warn!("Login attempt for unknown user {}", request.username);
            return Err(ApiError::Unauthorized(BAD_CREDENTIALS.to_string()));
        }
    };

    let token = state
        .jwt
        .issue(user.id, &user.username)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("User {} logged in", user.username);
    Ok(Json(ApiResponse::ok(
        LoginResponse {
            token,
            token_type: "Bearer".to_string(),
            expires_in: state.jwt.ttl_secs(),
            user: UserResponse::from(user),
        },
        "登录成功",
    )))
}

/// The logged-in user
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<UserResponse>),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    debug!("Loading user {}", auth.id);

    let user = user::Entity::find_by_id(auth.id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::not_found("User", auth.id))?;

    Ok(Json(ApiResponse::ok(UserResponse::from(user), "获取成功")))
}
