use compute::{CategoryStats, IdempotencyGuard, ParsedTransaction, StatsSummary};
use model::entities::{
    account::AccountType, category::TransactionType, transaction::TransactionStatus,
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use utoipa::{OpenApi, ToSchema};

use crate::auth::JwtKeys;
use crate::handlers::{
    accounts::{AccountResponse, CreateAccountRequest, UpdateAccountRequest},
    auth::{LoginRequest, LoginResponse, UserResponse},
    categories::{CategoryResponse, CreateCategoryRequest, UpdateCategoryRequest},
    transactions::{
        BatchConfirmResponse, TransactionPage, TransactionResponse,
        UpdateTransactionRequest,
    },
    webhook::{ParsedData, WebhookResult},
};
use crate::sms::{SmsMessage, TransactionParser};

/// Application state shared across handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// Database connection
    pub db: DatabaseConnection,
    /// Recently processed SMS keys
    pub idempotency: IdempotencyGuard,
    /// Reads bank SMS into transaction details
    pub parser: Arc<dyn TransactionParser>,
    /// Issues and verifies login tokens
    pub jwt: JwtKeys,
    /// Upper bound on the time spent serving one request
    pub request_timeout: Duration,
}

/// API response wrapper
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Response data
    pub data: T,
    /// Response message
    pub message: String,
    /// Success status
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            data,
            message: message.into(),
            success: true,
        }
    }
}

/// Error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Error code
    pub code: String,
    /// Success status (always false for errors)
    pub success: bool,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status
    pub status: String,
    /// Service version
    pub version: String,
    /// Database connection status
    pub database: String,
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_check,
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::webhook::receive_sms,
        crate::handlers::transactions::get_transactions,
        crate::handlers::transactions::get_transaction,
        crate::handlers::transactions::update_transaction,
        crate::handlers::transactions::delete_transaction,
        crate::handlers::transactions::batch_confirm,
        crate::handlers::accounts::get_accounts,
        crate::handlers::accounts::get_account,
        crate::handlers::accounts::create_account,
        crate::handlers::accounts::update_account,
        crate::handlers::accounts::delete_account,
        crate::handlers::accounts::toggle_account,
        crate::handlers::categories::get_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,
        crate::handlers::stats::get_summary,
        crate::handlers::stats::get_category_stats,
    ),
    components(
        schemas(
            ApiResponse<TransactionPage>,
            ApiResponse<TransactionResponse>,
            ApiResponse<AccountResponse>,
            ApiResponse<Vec<AccountResponse>>,
            ApiResponse<CategoryResponse>,
            ApiResponse<Vec<CategoryResponse>>,
            ApiResponse<StatsSummary>,
            ApiResponse<Vec<CategoryStats>>,
            ApiResponse<WebhookResult>,
            ApiResponse<LoginResponse>,
            ApiResponse<UserResponse>,
            ApiResponse<BatchConfirmResponse>,
            ErrorResponse,
            HealthResponse,
            LoginRequest,
            LoginResponse,
            UserResponse,
            SmsMessage,
            WebhookResult,
            ParsedData,
            ParsedTransaction,
            TransactionResponse,
            TransactionPage,
            UpdateTransactionRequest,
            BatchConfirmResponse,
            AccountResponse,
            CreateAccountRequest,
            UpdateAccountRequest,
            CategoryResponse,
            CreateCategoryRequest,
            UpdateCategoryRequest,
            StatsSummary,
            CategoryStats,
            AccountType,
            TransactionType,
            TransactionStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Login and current user"),
        (name = "webhook", description = "SMS ingestion for the iOS shortcut"),
        (name = "transactions", description = "Bill entries"),
        (name = "accounts", description = "Bank cards, wallets and cash"),
        (name = "categories", description = "Income and expense categories"),
        (name = "stats", description = "Income and expense statistics"),
    ),
    info(
        title = "EasyBill API",
        description = "个人财务管理 - bank SMS are collected by an iOS shortcut, read by an AI parser and turned into bills",
        version = "0.1.0",
    )
)]
pub struct ApiDoc;
