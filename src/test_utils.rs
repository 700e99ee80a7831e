#[cfg(test)]
pub mod test_utils {
    use crate::auth::JwtKeys;
    use crate::router::create_router;
    use crate::schemas::AppState;
    use crate::sms::{ParserError, TransactionParser};
    use async_trait::async_trait;
    use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue};
    use axum::Router;
    use compute::{IdempotencyGuard, ParsedTransaction};
    use migration::{Migrator, MigratorTrait};
    use model::entities::user;
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, Set};
    use std::{str::FromStr, sync::Arc, time::Duration};
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    pub const TEST_PASSWORD: &str = "password123";
    pub const TEST_JWT_SECRET: &str = "test-secret";

    /// Parser that answers without calling any AI service.
    #[derive(Debug, Clone)]
    pub enum StubParser {
        Returns(Option<ParsedTransaction>),
        Fails,
    }

    impl Default for StubParser {
        fn default() -> Self {
            Self::Returns(Some(ParsedTransaction {
                transaction_type: Some("EXPENSE".to_string()),
                amount: Decimal::from_str("35.50").ok(),
                merchant: Some("星巴克".to_string()),
                card_last_four: Some("1234".to_string()),
                transaction_time: Some("2025-01-15 14:30:00".to_string()),
                category_hint: Some("餐饮".to_string()),
            }))
        }
    }

    #[async_trait]
    impl TransactionParser for StubParser {
        async fn parse(
            &self,
            _raw_content: &str,
            _sender: &str,
        ) -> Result<Option<ParsedTransaction>, ParserError> {
            match self {
                Self::Returns(parsed) => Ok(parsed.clone()),
                Self::Fails => Err(ParserError::EmptyResponse),
            }
        }
    }

    /// Create an in-memory SQLite database for testing
    pub async fn setup_test_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("Failed to connect to in-memory database");

        // Run migrations
        Migrator::up(&db, None)
            .await
            .expect("Failed to run migrations");

        db
    }

    /// Inserts a user whose password is [`TEST_PASSWORD`] and whose API key
    /// is `test-api-key-<username>`.
    pub async fn create_test_user(db: &DatabaseConnection, username: &str) -> user::Model {
        // low cost keeps the suite fast
        let password_hash = bcrypt::hash(TEST_PASSWORD, 4).expect("Failed to hash password");

        user::ActiveModel {
            username: Set(username.to_string()),
            password_hash: Set(password_hash),
            api_key: Set(api_key_of(username)),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("Failed to create test user")
    }

    pub fn api_key_of(username: &str) -> String {
        format!("test-api-key-{username}")
    }

    /// Create AppState for testing, with `alice` and `bob` already registered
    pub async fn setup_test_app_state_with(parser: StubParser) -> AppState {
        let db = setup_test_db().await;

        create_test_user(&db, "alice").await;
        create_test_user(&db, "bob").await;

        AppState {
            db,
            idempotency: IdempotencyGuard::new(Duration::from_secs(60), 1_000),
            parser: Arc::new(parser),
            jwt: JwtKeys::new(TEST_JWT_SECRET, 24),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub async fn setup_test_app_state() -> AppState {
        setup_test_app_state_with(StubParser::default()).await
    }

    /// `Authorization` header carrying `token`.
    pub fn bearer(token: &str) -> (HeaderName, HeaderValue) {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .expect("Token is not a valid header value");
        (AUTHORIZATION, value)
    }

    /// Login token of the seeded user `username`.
    pub async fn token_for(state: &AppState, username: &str) -> String {
        let user = user::Entity::find_by_username(&state.db, username)
            .await
            .expect("Failed to query user")
            .expect("User is not seeded");
        state
            .jwt
            .issue(user.id, &user.username)
            .expect("Failed to issue token")
    }

    /// Initialize tracing for tests with output to STDERR.
    ///
    /// The log level is read from `RUST_LOG`, defaulting to WARN.
    pub fn init_test_tracing() -> tracing::subscriber::DefaultGuard {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|level| Level::from_str(&level).ok())
            .unwrap_or(Level::WARN);

        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Create axum app for testing
    pub async fn setup_test_app() -> Router {
        let _guard = init_test_tracing();

        create_router(setup_test_app_state().await)
    }
}
