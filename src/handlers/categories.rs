use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use model::entities::category::{self, TransactionType};
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState};

const SYSTEM_CATEGORY_READ_ONLY: &str = "系统分类不可修改";
const PARENT_CYCLE: &str = "父分类不能是自身或其子分类";
const HAS_CHILDREN: &str = "该分类下还有子分类，无法删除";

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CategoryQuery {
    /// Only categories of this type
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
}

/// Request body for creating a category
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub category_type: TransactionType,
    pub parent_id: Option<i32>,
    /// Position in lists (default: 0)
    pub sort_order: Option<i32>,
}

/// Request body for updating a category; absent fields are left alone
#[derive(Debug, Default, Deserialize, Serialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 50))]
    pub name: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub category_type: Option<TransactionType>,
    pub parent_id: Option<i32>,
    pub sort_order: Option<i32>,
}

/// Category response model
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: i32,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(rename = "type")]
    pub category_type: TransactionType,
    pub parent_id: Option<i32>,
    pub parent_name: Option<String>,
    /// Preset shared by all users; read-only
    pub is_system: bool,
    pub sort_order: i32,
}

impl CategoryResponse {
    fn new(model: category::Model, parent_name: Option<String>) -> Self {
        Self {
            id: model.id,
            name: model.name,
            icon: model.icon,
            color: model.color,
            category_type: model.category_type,
            parent_id: model.parent_id,
            parent_name,
            is_system: model.is_system,
            sort_order: model.sort_order,
        }
    }
}

/// Loads a category the user may see, failing with 404 or 403.
async fn find_visible<C>(db: &C, user: &AuthUser, id: i32) -> ApiResult<category::Model>
where
    C: ConnectionTrait,
{
    let model = category::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Category", id))?;
    if !model.is_visible_to(user.id) {
        return Err(ApiError::Forbidden("无权访问此分类".to_string()));
    }
    Ok(model)
}

/// Loads a category the user may change: their own, never a system preset.
async fn find_editable<C>(db: &C, user: &AuthUser, id: i32) -> ApiResult<category::Model>
where
    C: ConnectionTrait,
{
    let model = find_visible(db, user, id).await?;
    if model.is_system || model.user_id.is_none() {
        warn!("User {} tried to modify system category {}", user.id, id);
        return Err(ApiError::Forbidden(SYSTEM_CATEGORY_READ_ONLY.to_string()));
    }
    Ok(model)
}

/// List the user's and the system categories
#[utoipa::path(
    get,
    path = "/api/categories",
    tag = "categories",
    params(CategoryQuery),
    responses(
        (status = 200, description = "Categories retrieved successfully", body = ApiResponse<Vec<CategoryResponse>>),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_categories(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CategoryQuery>,
) -> ApiResult<Json<ApiResponse<Vec<CategoryResponse>>>> {
    trace!("Entering get_categories function");

    let mut select = category::Entity::find_visible_to(user.id);
    if let Some(kind) = query.transaction_type {
        select = select.filter(category::Column::CategoryType.eq(kind));
    }
    let categories = select.all(&state.db).await?;

    // parents are visible categories too, but may be of another type
    let parent_names: HashMap<i32, String> = category::Entity::find_visible_to(user.id)
        .all(&state.db)
        .await?
        .into_iter()
        .map(|c| (c.id, c.name))
        .collect();

    let data: Vec<CategoryResponse> = categories
        .into_iter()
        .map(|c| {
            let parent_name = c.parent_id.and_then(|id| parent_names.get(&id).cloned());
            CategoryResponse::new(c, parent_name)
        })
        .collect();

    info!("Retrieved {} categories for user {}", data.len(), user.id);
    Ok(Json(ApiResponse::ok(data, "获取成功")))
}

/// Get one category
#[utoipa::path(
    get,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category retrieved successfully", body = ApiResponse<CategoryResponse>),
        (status = 403, description = "Belongs to another user", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<CategoryResponse>>> {
    trace!("Entering get_category function");

    let model = find_visible(&state.db, &user, id).await?;
    let parent_name = match model.parent_id {
        Some(parent_id) => category::Entity::find_by_id(parent_id)
            .one(&state.db)
            .await?
            .map(|p| p.name),
        None => None,
    };

    Ok(Json(ApiResponse::ok(
        CategoryResponse::new(model, parent_name),
        "获取成功",
    )))
}

/// Create a category of the user's own
#[utoipa::path(
    post,
    path = "/api/categories",
    tag = "categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Parent category not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn create_category(
    State(state): State<AppState>,
    user: AuthUser,
    Valid(Json(request)): Valid<Json<CreateCategoryRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<CategoryResponse>>)> {
    trace!("Entering create_category function");
    debug!("Creating category '{}' for user {}", request.name, user.id);

    let parent_name = match request.parent_id {
        Some(parent_id) => Some(find_visible(&state.db, &user, parent_id).await?.name),
        None => None,
    };

    let created = category::ActiveModel {
        user_id: Set(Some(user.id)),
        parent_id: Set(request.parent_id),
        name: Set(request.name),
        icon: Set(request.icon),
        color: Set(request.color),
        category_type: Set(request.category_type),
        is_system: Set(false),
        sort_order: Set(request.sort_order.unwrap_or(0)),
        ..Default::default()
    }
    .insert(&state.db)
    .await?;

    info!("Category created successfully with ID: {}", created.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            CategoryResponse::new(created, parent_name),
            "分类已创建",
        )),
    ))
}

/// Edit one of the user's categories
#[utoipa::path(
    put,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category ID")),
    request_body = UpdateCategoryRequest,
    responses(
        (status = 200, description = "Category updated successfully", body = ApiResponse<CategoryResponse>),
        (status = 400, description = "Parent is the category itself or one of its descendants", body = ErrorResponse),
        (status = 403, description = "System category or another user's", body = ErrorResponse),
        (status = 404, description = "Category or parent not found", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn update_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
    Valid(Json(request)): Valid<Json<UpdateCategoryRequest>>,
) -> ApiResult<Json<ApiResponse<CategoryResponse>>> {
    trace!("Entering update_category function");

    let model = find_editable(&state.db, &user, id).await?;
    let mut active: category::ActiveModel = model.into();

    if let Some(name) = request.name {
        active.name = Set(name);
    }
    if let Some(icon) = request.icon {
        active.icon = Set(Some(icon));
    }
    if let Some(color) = request.color {
        active.color = Set(Some(color));
    }
    if let Some(kind) = request.category_type {
        active.category_type = Set(kind);
    }
    if let Some(parent_id) = request.parent_id {
        if parent_id == id {
            return Err(ApiError::BadRequest(PARENT_CYCLE.to_string()));
        }
        find_visible(&state.db, &user, parent_id).await?;
        if category::Entity::ancestor_ids(&state.db, parent_id)
            .await?
            .contains(&id)
        {
            warn!("Category {} cannot move under its descendant {}", id, parent_id);
            return Err(ApiError::BadRequest(PARENT_CYCLE.to_string()));
        }
        active.parent_id = Set(Some(parent_id));
    }
    if let Some(sort_order) = request.sort_order {
        active.sort_order = Set(sort_order);
    }

    let updated = active.update(&state.db).await?;
    info!("Category {} updated", updated.id);

    let parent_name = match updated.parent_id {
        Some(parent_id) => category::Entity::find_by_id(parent_id)
            .one(&state.db)
            .await?
            .map(|p| p.name),
        None => None,
    };
    Ok(Json(ApiResponse::ok(
        CategoryResponse::new(updated, parent_name),
        "分类已更新",
    )))
}

/// Delete one of the user's categories
#[utoipa::path(
    delete,
    path = "/api/categories/{id}",
    tag = "categories",
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Category deleted"),
        (status = 403, description = "System category or another user's", body = ErrorResponse),
        (status = 404, description = "Category not found", body = ErrorResponse),
        (status = 409, description = "Category still has subcategories", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn delete_category(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<StatusCode> {
    trace!("Entering delete_category function");

    let model = find_editable(&state.db, &user, id).await?;
    let children = model.get_children(&state.db).await?;
    if !children.is_empty() {
        debug!("Category {} still has {} children", id, children.len());
        return Err(ApiError::Conflict(HAS_CHILDREN.to_string()));
    }
    category::Entity::delete_by_id(model.id)
        .exec(&state.db)
        .await?;

    info!("Category {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}
