use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use model::entities::{
    account::{self, AccountType},
    transaction,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;
use validator::Validate;

use super::ensure_owner;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState};

/// Request body for creating a new account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    /// Display name, e.g. "招商银行储蓄卡"
    #[validate(length(min = 1, max = 100))]
    pub account_name: String,
    pub account_type: AccountType,
    /// Last four digits of the card, used to match incoming SMS
    #[validate(length(equal = 4))]
    pub last_four_digits: Option<String>,
    pub source_identifier: Option<String>,
    /// Opening balance (default: 0)
    #[schema(value_type = Option<String>, example = "0.00")]
    pub balance: Option<Decimal>,
}

/// Request body for updating an account; absent fields are left alone
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    #[validate(length(min = 1, max = 100))]
    pub account_name: Option<String>,
    pub account_type: Option<AccountType>,
    #[validate(length(equal = 4))]
    pub last_four_digits: Option<String>,
    pub source_identifier: Option<String>,
    #[schema(value_type = Option<String>, example = "100.00")]
    pub balance: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Account response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    pub id: i32,
    pub account_name: String,
    pub account_type: AccountType,
    pub last_four_digits: Option<String>,
    pub source_identifier: Option<String>,
    #[schema(value_type = String, example = "0.00")]
    pub balance: Decimal,
    pub is_active: bool,
    /// Number of transactions booked on this account
    pub transaction_count: u64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl AccountResponse {
    fn new(model: account::Model, transaction_count: u64) -> Self {
        Self {
            id: model.id,
            account_name: model.account_name,
            account_type: model.account_type,
            last_four_digits: model.last_four_digits,
            source_identifier: model.source_identifier,
            balance: model.balance,
            is_active: model.is_active,
            transaction_count,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    async fn load<C>(db: &C, model: account::Model) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let count = transaction::Entity::find()
            .filter(transaction::Column::AccountId.eq(model.id))
            .count(db)
            .await?;
        Ok(Self::new(model, count))
    }
}

/// Transaction count per account of `user_id`.
async fn transaction_counts<C>(db: &C, user_id: i32) -> Result<HashMap<i32, u64>, DbErr>
where
    C: ConnectionTrait,
{
    let rows: Vec<(Option<i32>, i64)> = transaction::Entity::find()
        .select_only()
        .column(transaction::Column::AccountId)
        .column_as(transaction::Column::Id.count(), "transaction_count")
        .filter(transaction::Column::UserId.eq(user_id))
        .filter(transaction::Column::AccountId.is_not_null())
        .group_by(transaction::Column::AccountId)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(account_id, count)| account_id.map(|id| (id, count.max(0) as u64)))
        .collect())
}

async fn find_owned<C>(db: &C, user: &AuthUser, id: i32) -> ApiResult<account::Model>
where
    C: ConnectionTrait,
{
    let model = account::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Account", id))?;
    ensure_owner(user, model.user_id, "账户")?;
    Ok(model)
}

/// SMS are matched to accounts by card number, so it must stay unambiguous.
async fn ensure_last_four_free<C>(
    db: &C,
    user: &AuthUser,
    last_four: &str,
    except: Option<i32>,
) -> ApiResult<()>
where
    C: ConnectionTrait,
{
    match account::Entity::find_by_last_four(db, user.id, last_four).await? {
        Some(existing) if Some(existing.id) != except => Err(ApiError::Conflict(format!(
            "尾号为 {last_four} 的账户已存在"
        ))),
        _ => Ok(()),
    }
}

/// List the user's accounts, newest first
#[utoipa::path(
    get,
    path = "/api/accounts",
    tag = "accounts",
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = ApiResponse<Vec<AccountResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_accounts(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<ApiResponse<Vec<AccountResponse>>>> {
    trace!("Entering get_accounts function");

    let accounts = account::Entity::find()
        .filter(account::Column::UserId.eq(user.id))
        .order_by_desc(account::Column::CreatedAt)
        .order_by_desc(account::Column::Id)
        .all(&state.db)
        .await?;
    let counts = transaction_counts(&state.db, user.id).await?;

    let data: Vec<AccountResponse> = accounts
        .into_iter()
        .map(|a| {
            let count = counts.get(&a.id).copied().unwrap_or(0);
            AccountResponse::new(a, count)
        })
        .collect();

    info!("Retrieved {} accounts for user {}", data.len(), user.id);
    Ok(Json(ApiResponse::ok(data, "获取成功")))
}

/// Get one account
#[utoipa::path(
    get,
    path = "/api/accounts/{id}",
    tag = "accounts",
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account retrieved successfully", body = ApiResponse<AccountResponse>),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<AccountResponse>>> {
    trace!("Entering get_account function");

    let model = find_owned(&state.db, &user, id).await?;
    let response = AccountResponse::load(&state.db, model).await?;

    Ok(Json(ApiResponse::ok(response, "获取成功")))
}

/// Create an account
#[utoipa::path(
    post,
    path = "/api/accounts",
    tag = "accounts",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created successfully", body = ApiResponse<AccountResponse>),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Another account has the same last four digits", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_account(
    State(state): State<AppState>,
    user: AuthUser,
    Valid(Json(request)): Valid<Json<CreateAccountRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AccountResponse>>)> {
    trace!("Entering create_account function");
    debug!(
        "Creating account '{}' ({:?}) for user {}",
        request.account_name, request.account_type, user.id
    );

    if let Some(last_four) = &request.last_four_digits {
        ensure_last_four_free(&state.db, &user, last_four, None).await?;
    }

    let created = account::ActiveModel {
        user_id: Set(user.id),
        account_name: Set(request.account_name),
        account_type: Set(request.account_type),
        last_four_digits: Set(request.last_four_digits),
        source_identifier: Set(request.source_identifier),
        balance: Set(request.balance.unwrap_or(Decimal::ZERO)),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Account created successfully with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(AccountResponse::new(created, 0), "账户已创建")),
    ))
}

/// Edit an account
#[utoipa::path(
    put,
    path = "/api/accounts/{id}",
    tag = "accounts",
    params(("id" = i32, Path, description = "Account ID")),
    request_body = UpdateAccountRequest,
    responses(
        (status = 200, description = "Account updated successfully", body = ApiResponse<AccountResponse>),
        (status = 409, description = "Another account has the same last four digits", body = ErrorResponse),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateAccountRequest>>,
) -> ApiResult<Json<ApiResponse<AccountResponse>>> {
    trace!("Entering update_account function");

    let mut active: account::ActiveModel = find_owned(&state.db, &user, id).await?.into();
    if let Some(name) = request.account_name {
        active.account_name = Set(name);
    }
    if let Some(kind) = request.account_type {
        active.account_type = Set(kind);
    }
    if let Some(last_four) = request.last_four_digits {
        ensure_last_four_free(&state.db, &user, &last_four, Some(id)).await?;
        active.last_four_digits = Set(Some(last_four));
    }
    if let Some(source) = request.source_identifier {
        active.source_identifier = Set(Some(source));
    }
    if let Some(balance) = request.balance {
        active.balance = Set(balance);
    }
    if let Some(is_active) = request.is_active {
        active.is_active = Set(is_active);
    }

    let updated = active.update(&state.db).await?;
    info!("Account {} updated", updated.id);
    let response = AccountResponse::load(&state.db, updated).await?;

    Ok(Json(ApiResponse::ok(response, "账户已更新")))
}

/// Delete an account; its transactions are kept without an account
#[utoipa::path(
    delete,
    path = "/api/accounts/{id}",
    tag = "accounts",
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 204, description = "Account deleted"),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_account function");

    let model = find_owned(&state.db, &user, id).await?;
    account::Entity::delete_by_id(model.id).exec(&state.db).await?;

    info!("Account {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Enable or disable an account
#[utoipa::path(
    post,
    path = "/api/accounts/{id}/toggle",
    tag = "accounts",
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Account toggled", body = ApiResponse<AccountResponse>),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn toggle_account(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<AccountResponse>>> {
    trace!("Entering toggle_account function");

    let model = find_owned(&state.db, &user, id).await?;
    let enabled = !model.is_active;
    let mut active: account::ActiveModel = model.into();
    active.is_active = Set(enabled);
    let updated = active.update(&state.db).await?;

    info!("Account {} is now {}", id, if enabled { "active" } else { "inactive" });
    let response = AccountResponse::load(&state.db, updated).await?;
    let message = if enabled { "账户已启用" } else { "账户已停用" };

    Ok(Json(ApiResponse::ok(response, message)))
}
