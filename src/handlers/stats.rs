use axum::{
    extract::{Query, State},
    response::Json,
};
use chrono::NaiveDateTime;
use compute::{category_breakdown, summarize, CategoryStats, StatsSummary};
use model::entities::{category, category::TransactionType, transaction};
use sea_orm::QuerySelect;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, instrument, trace};
use utoipa::IntoParams;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::schemas::{ApiResponse, AppState};

/// Inclusive time window; either end may be left open
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

/// Time window plus an optional direction filter
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CategoryStatsQuery {
    /// Only count income or only count expenses
    #[serde(rename = "type")]
    pub transaction_type: Option<TransactionType>,
    pub start_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
}

impl CategoryStatsQuery {
    fn range(&self) -> DateRangeQuery {
        DateRangeQuery {
            start_date: self.start_date,
            end_date: self.end_date,
        }
    }
}

impl DateRangeQuery {
    fn check_range(&self) -> ApiResult<()> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) if start > end => Err(ApiError::BadRequest(
                "startDate must not be after endDate".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

async fn load_transactions(
    state: &AppState,
    user: &AuthUser,
    query: &DateRangeQuery,
) -> ApiResult<Vec<transaction::Model>> {
    query.check_range()?;
    debug!(
        "Loading transactions of user {} between {:?} and {:?}",
        user.id, query.start_date, query.end_date
    );
    Ok(
        transaction::Entity::find_for_user_between(user.id, query.start_date, query.end_date)
            .all(&state.db)
            .await?,
    )
}

/// Income, expense and balance over a period
#[utoipa::path(
    get,
    path = "/api/stats/summary",
    tag = "stats",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Summary computed", body = ApiResponse<StatsSummary>),
        (status = 400, description = "startDate after endDate", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_summary(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DateRangeQuery>,
) -> ApiResult<Json<ApiResponse<StatsSummary>>> {
    trace!("Entering get_summary function");

    let transactions = load_transactions(&state, &user, &query).await?;
    let summary = summarize(&transactions);

    info!(
        "Summary for user {}: {} transactions, balance {}",
        user.id, summary.transaction_count, summary.balance
    );
    Ok(Json(ApiResponse::ok(summary, "获取成功")))
}

/// Totals per category over a period, largest first
#[utoipa::path(
    get,
    path = "/api/stats/categories",
    tag = "stats",
    params(CategoryStatsQuery),
    responses(
        (status = 200, description = "Category breakdown computed", body = ApiResponse<Vec<CategoryStats>>),
        (status = 400, description = "startDate after endDate", body = ErrorResponse),
        (status = 401, description = "Not logged in", body = ErrorResponse)
    )
)]
#[instrument(skip(state))]
pub async fn get_category_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<CategoryStatsQuery>,
) -> ApiResult<Json<ApiResponse<Vec<CategoryStats>>>> {
    trace!("Entering get_category_stats function");

    let transactions = load_transactions(&state, &user, &query.range()).await?;
    let names: HashMap<i32, String> = category::Entity::find_visible_to(user.id)
        .select_only()
        .column(category::Column::Id)
        .column(category::Column::Name)
        .into_tuple::<(i32, String)>()
        .all(&state.db)
        .await?
        .into_iter()
        .collect();

    let stats = category_breakdown(&transactions, &names, query.transaction_type);

    info!("Computed {} category rows for user {}", stats.len(), user.id);
    Ok(Json(ApiResponse::ok(stats, "获取成功")))
}
