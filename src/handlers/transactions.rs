use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::NaiveDateTime;
use model::entities::{
    account, category,
    category::TransactionType,
    transaction::{self, TransactionStatus},
};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, Order,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::ensure_owner;
use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState};

const DEFAULT_PAGE_SIZE: u64 = 20;

/// Column a transaction list is ordered by
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
    #[default]
    TransactionTime,
    Amount,
    CreatedAt,
    Merchant,
}

impl SortField {
    fn column(self) -> transaction::Column {
        match self {
            Self::TransactionTime => transaction::Column::TransactionTime,
            Self::Amount => transaction::Column::Amount,
            Self::CreatedAt => transaction::Column::CreatedAt,
            Self::Merchant => transaction::Column::Merchant,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        }
    }
}

/// Filters, paging and ordering for the transaction list
#[derive(Debug, Default, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct TransactionQuery {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub status: Option<TransactionStatus>,
    pub category_id: Option<i32>,
    pub account_id: Option<i32>,
    /// Inclusive lower bound on the transaction time
    pub start_date: Option<NaiveDateTime>,
    /// Inclusive upper bound on the transaction time
    pub end_date: Option<NaiveDateTime>,
    /// Zero-based page number (default: 0, at most 1000000)
    #[validate(range(max = 1_000_000))]
    pub page: Option<u64>,
    /// Page size (default: 20)
    #[validate(range(min = 1, max = 100))]
    pub size: Option<u64>,
    pub sort_by: Option<SortField>,
    pub sort_direction: Option<SortDirection>,
}

/// A transaction with the names of its account and category
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: i32,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    #[schema(value_type = String, example = "35.50")]
    pub amount: Decimal,
    pub merchant: Option<String>,
    pub transaction_time: NaiveDateTime,
    pub status: TransactionStatus,
    pub remark: Option<String>,
    pub account_id: Option<i32>,
    pub account_name: Option<String>,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub category_icon: Option<String>,
    pub raw_log_id: Option<i32>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TransactionResponse {
    fn new(
        model: transaction::Model,
        account: Option<&account::Model>,
        category: Option<&category::Model>,
    ) -> Self {
        Self {
            id: model.id,
            transaction_type: model.transaction_type,
            amount: model.amount,
            merchant: model.merchant,
            transaction_time: model.transaction_time,
            status: model.status,
            remark: model.remark,
            account_id: model.account_id,
            account_name: account.map(|a| a.account_name.clone()),
            category_id: model.category_id,
            category_name: category.map(|c| c.name.clone()),
            category_icon: category.and_then(|c| c.icon.clone()),
            raw_log_id: model.raw_log_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    /// Resolves account and category names with one query each.
    pub async fn load_all<C>(db: &C, models: Vec<transaction::Model>) -> Result<Vec<Self>, DbErr>
    where
        C: ConnectionTrait,
    {
        let account_ids: BTreeSet<i32> = models.iter().filter_map(|m| m.account_id).collect();
        let category_ids: BTreeSet<i32> = models.iter().filter_map(|m| m.category_id).collect();

        let accounts: HashMap<i32, account::Model> = if account_ids.is_empty() {
            HashMap::new()
        } else {
            account::Entity::find()
                .filter(account::Column::Id.is_in(account_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|a| (a.id, a))
                .collect()
        };
        let categories: HashMap<i32, category::Model> = if category_ids.is_empty() {
            HashMap::new()
        } else {
            category::Entity::find()
                .filter(category::Column::Id.is_in(category_ids))
                .all(db)
                .await?
                .into_iter()
                .map(|c| (c.id, c))
                .collect()
        };

        Ok(models
            .into_iter()
            .map(|m| {
                let account = m.account_id.and_then(|id| accounts.get(&id));
                let category = m.category_id.and_then(|id| categories.get(&id));
                Self::new(m, account, category)
            })
            .collect())
    }

    pub async fn load<C>(db: &C, model: transaction::Model) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut loaded = Self::load_all(db, vec![model]).await?;
        loaded
            .pop()
            .ok_or_else(|| DbErr::Custom("transaction vanished while loading".to_string()))
    }
}

/// One page of transactions
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub content: Vec<TransactionResponse>,
    /// Zero-based page number
    pub page: u64,
    pub size: u64,
    pub total_elements: u64,
    pub total_pages: u64,
    /// Whether this is the final page
    pub last: bool,
}

/// Partial update of a transaction; absent fields are left alone
#[derive(Debug, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTransactionRequest {
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    #[schema(value_type = Option<String>, example = "35.50")]
    pub amount: Option<Decimal>,
    pub merchant: Option<String>,
    pub transaction_time: Option<NaiveDateTime>,
    pub category_id: Option<i32>,
    pub account_id: Option<i32>,
    pub status: Option<TransactionStatus>,
    pub remark: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchConfirmResponse {
    /// Number of transactions now confirmed
    pub confirmed_count: u64,
}

async fn find_owned<C>(db: &C, user: &AuthUser, id: i32) -> ApiResult<transaction::Model>
where
    C: ConnectionTrait,
{
    let model = transaction::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction", id))?;
    ensure_owner(user, model.user_id, "交易")?;
    Ok(model)
}

/// List the user's transactions
#[utoipa::path(
    get,
    path = "/api/transactions",
    tag = "transactions",
    params(TransactionQuery),
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = ApiResponse<TransactionPage>),
        (status = 400, description = "Invalid query"),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Valid(Query(query)): Valid<Query<TransactionQuery>>,
) -> ApiResult<Json<ApiResponse<TransactionPage>>> {
    trace!("Entering get_transactions function");

    let page = query.page.unwrap_or(0);
    let size = query.size.unwrap_or(DEFAULT_PAGE_SIZE);
    let sort_by = query.sort_by.unwrap_or_default();
    let direction = query.sort_direction.unwrap_or_default();
    debug!(
        "Listing transactions for user {} - page: {}, size: {}, sort: {:?} {:?}",
        user.id, page, size, sort_by, direction
    );

    let mut select =
        transaction::Entity::find_for_user_between(user.id, query.start_date, query.end_date);
    if let Some(kind) = query.transaction_type {
        select = select.filter(transaction::Column::TransactionType.eq(kind));
    }
    if let Some(status) = query.status {
        select = select.filter(transaction::Column::Status.eq(status));
    }
    if let Some(category_id) = query.category_id {
        select = select.filter(transaction::Column::CategoryId.eq(category_id));
    }
    if let Some(account_id) = query.account_id {
        select = select.filter(transaction::Column::AccountId.eq(account_id));
    }

    let paginator = select
        .order_by(sort_by.column(), direction.into())
        .order_by(transaction::Column::Id, direction.into())
        .paginate(&state.db, size);
    let totals = paginator.num_items_and_pages().await?;
    let models = paginator.fetch_page(page).await?;
    let content = TransactionResponse::load_all(&state.db, models).await?;

    info!(
        "Retrieved {} of {} transactions for user {}",
        content.len(),
        totals.number_of_items,
        user.id
    );
    Ok(Json(ApiResponse::ok(
        TransactionPage {
            content,
            page,
            size,
            total_elements: totals.number_of_items,
            total_pages: totals.number_of_pages,
            last: page + 1 >= totals.number_of_pages,
        },
        "获取成功",
    )))
}

/// Get one transaction
#[utoipa::path(
    get,
    path = "/api/transactions/{id}",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction retrieved successfully", body = ApiResponse<TransactionResponse>),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<TransactionResponse>>> {
    trace!("Entering get_transaction function");

    let model = find_owned(&state.db, &user, id).await?;
    let response = TransactionResponse::load(&state.db, model).await?;

    Ok(Json(ApiResponse::ok(response, "获取成功")))
}

/// Edit a transaction
#[utoipa::path(
    put,
    path = "/api/transactions/{id}",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    request_body = UpdateTransactionRequest,
    responses(
        (status = 200, description = "Transaction updated successfully", body = ApiResponse<TransactionResponse>),
        (status = 400, description = "Negative amount", body = ErrorResponse),
        (status = 403, description = "Transaction, account or category belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction, account or category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Json(request): Json<UpdateTransactionRequest>,
) -> ApiResult<Json<ApiResponse<TransactionResponse>>> {
    trace!("Entering update_transaction function");

    let model = find_owned(&state.db, &user, id).await?;
    let mut active: transaction::ActiveModel = model.into();

    if let Some(kind) = request.transaction_type {
        active.transaction_type = Set(kind);
    }
    if let Some(amount) = request.amount {
        if amount.is_sign_negative() {
            return Err(ApiError::BadRequest("amount must not be negative".to_string()));
        }
        active.amount = Set(amount);
    }
    if let Some(merchant) = request.merchant {
        active.merchant = Set(Some(merchant));
    }
    if let Some(time) = request.transaction_time {
        active.transaction_time = Set(time);
    }
    if let Some(category_id) = request.category_id {
        let category = category::Entity::find_by_id(category_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Category", category_id))?;
        if !category.is_visible_to(user.id) {
            return Err(ApiError::Forbidden("无权使用此分类".to_string()));
        }
        active.category_id = Set(Some(category_id));
    }
    if let Some(account_id) = request.account_id {
        let account = account::Entity::find_by_id(account_id)
            .one(&state.db)
            .await?
            .ok_or_else(|| ApiError::not_found("Account", account_id))?;
        ensure_owner(&user, account.user_id, "账户")?;
        active.account_id = Set(Some(account_id));
    }
    if let Some(status) = request.status {
        active.status = Set(status);
    }
    if let Some(remark) = request.remark {
        active.remark = Set(Some(remark));
    }

    let updated = active.update(&state.db).await?;
    info!("Transaction {} updated", updated.id);
    let response = TransactionResponse::load(&state.db, updated).await?;

    Ok(Json(ApiResponse::ok(response, "交易已更新")))
}

/// Delete a transaction
#[utoipa::path(
    delete,
    path = "/api/transactions/{id}",
    tag = "transactions",
    params(("id" = i32, Path, description = "Transaction ID")),
    responses(
        (status = 204, description = "Transaction deleted"),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Transaction not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_transaction function");

    let model = find_owned(&state.db, &user, id).await?;
    transaction::Entity::delete_by_id(model.id)
        .exec(&state.db)
        .await?;

    info!("Transaction {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

/// Confirm several pending transactions at once
///
/// The body is a bare JSON array of transaction ids. Either every listed
/// transaction is confirmed or none is.
#[utoipa::path(
    post,
    path = "/api/transactions/batch/confirm",
    tag = "transactions",
    request_body(content = Vec<i32>, description = "Ids of the transactions to confirm", example = json!([1, 2, 3])),
    responses(
        (status = 200, description = "Transactions confirmed", body = ApiResponse<BatchConfirmResponse>),
        (status = 400, description = "Empty id list", body = ErrorResponse),
        (status = 403, description = "A transaction belongs to another user", body = ErrorResponse),
        (status = 404, description = "A transaction does not exist", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn batch_confirm(
    State(state): State<AppState>,
    user: AuthUser,
    Json(ids): Json<Vec<i32>>,
) -> ApiResult<Json<ApiResponse<BatchConfirmResponse>>> {
    trace!("Entering batch_confirm function");

    if ids.is_empty() {
        return Err(ApiError::BadRequest("ids must not be empty".to_string()));
    }
    let ids: BTreeSet<i32> = ids.into_iter().collect();
    debug!("Confirming {} transactions for user {}", ids.len(), user.id);

    let txn = state.db.begin().await?;

    let found = transaction::Entity::find()
        .filter(transaction::Column::Id.is_in(ids.iter().copied()))
        .all(&txn)
        .await?;
    if let Some(missing) = ids.iter().find(|id| !found.iter().any(|m| m.id == **id)) {
        return Err(ApiError::not_found("Transaction", *missing));
    }
    if let Some(foreign) = found.iter().find(|m| m.user_id != user.id) {
        warn!("User {} tried to confirm transaction {}", user.id, foreign.id);
        return Err(ApiError::Forbidden("无权操作此交易".to_string()));
    }

    let result = transaction::Entity::update_many()
        .col_expr(
            transaction::Column::Status,
            Expr::value(TransactionStatus::Confirmed),
        )
        .col_expr(transaction::Column::UpdatedAt, Expr::value(model::now()))
        .filter(transaction::Column::Id.is_in(ids.iter().copied()))
        .filter(transaction::Column::UserId.eq(user.id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    info!("Confirmed {} transactions for user {}", result.rows_affected, user.id);
    Ok(Json(ApiResponse::ok(
        BatchConfirmResponse {
            confirmed_count: result.rows_affected,
        },
        "批量确认成功",
    )))
}
