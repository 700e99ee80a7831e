use crate::handlers::{
    accounts::{
        create_account, delete_account, get_account, get_accounts, toggle_account, update_account,
    },
    auth::{login, me},
    categories::{
        create_category, delete_category, get_categories, get_category, update_category,
    },
    health::health_check,
    pages::home_page,
    stats::{get_category_stats, get_summary},
    transactions::{
        batch_confirm, delete_transaction, get_transaction, get_transactions, update_transaction,
    },
    webhook::receive_sms,
};
use crate::schemas::{ApiDoc, AppState};
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Create application router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let request_timeout = state.request_timeout;

    Router::new()
        // Landing page
        .route("/", get(home_page))
        // Health check
        .route("/health", get(health_check))
        // Authentication
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        // SMS webhook for the iOS shortcut
        .route("/api/webhook/sms", post(receive_sms))
        // Transactions
        .route("/api/transactions", get(get_transactions))
        .route("/api/transactions/batch/confirm", post(batch_confirm))
        .route(
            "/api/transactions/:id",
            get(get_transaction)
                .put(update_transaction)
                .delete(delete_transaction),
        )
        // Accounts
        .route("/api/accounts", get(get_accounts).post(create_account))
        .route(
            "/api/accounts/:id",
            get(get_account).put(update_account).delete(delete_account),
        )
        .route("/api/accounts/:id/toggle", post(toggle_account))
        // Categories
        .route("/api/categories", get(get_categories).post(create_category))
        .route(
            "/api/categories/:id",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
        // Statistics
        .route("/api/stats/summary", get(get_summary))
        .route("/api/stats/categories", get(get_category_stats))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
