#[cfg(test)]
mod integration_tests {
    use crate::auth::{INVALID_API_KEY, INVALID_TOKEN, MISSING_AUTH_HEADER};
    use crate::handlers::auth::{LoginRequest, BAD_CREDENTIALS};
    use crate::pages::render_home_page;
    use crate::router::create_router;
    use crate::schemas::{ApiResponse, AppState, ErrorResponse};
    use crate::test_utils::test_utils::{
        api_key_of, bearer, setup_test_app, setup_test_app_state, setup_test_app_state_with,
        token_for, StubParser, TEST_PASSWORD,
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use chrono::NaiveDateTime;
    use model::entities::{
        category,
        category::TransactionType,
        transaction::{self, TransactionStatus},
        user,
    };
    use rust_decimal::Decimal;
    use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
    use serde_json::{json, Value};
    use std::str::FromStr;

    const SMS: &str = "【招商银行】您尾号1234的储蓄卡1月15日14:30消费35.50元，商户：星巴克";

    async fn setup() -> (TestServer, AppState) {
        setup_with(StubParser::default()).await
    }

    async fn setup_with(parser: StubParser) -> (TestServer, AppState) {
        let state = setup_test_app_state_with(parser).await;
        let server = TestServer::new(create_router(state.clone())).unwrap();
        (server, state)
    }

    async fn user_id(state: &AppState, username: &str) -> i32 {
        user::Entity::find_by_username(&state.db, username)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    async fn category_id(state: &AppState, name: &str) -> i32 {
        category::Entity::find()
            .filter(category::Column::Name.eq(name))
            .one(&state.db)
            .await
            .unwrap()
            .unwrap()
            .id
    }

    async fn insert_transaction(
        state: &AppState,
        user_id: i32,
        kind: TransactionType,
        amount: &str,
        time: &str,
        category_id: Option<i32>,
    ) -> transaction::Model {
        transaction::ActiveModel {
            user_id: Set(user_id),
            category_id: Set(category_id),
            transaction_type: Set(kind),
            amount: Set(Decimal::from_str(amount).unwrap()),
            merchant: Set(Some(format!("merchant {amount}"))),
            transaction_time: Set(NaiveDateTime::parse_from_str(time, "%Y-%m-%d %H:%M:%S").unwrap()),
            status: Set(TransactionStatus::Pending),
            ..Default::default()
        }
        .insert(&state.db)
        .await
        .unwrap()
    }

    fn decimal(value: &Value) -> Decimal {
        match value {
            Value::String(s) => Decimal::from_str(s).unwrap(),
            other => Decimal::from_str(&other.to_string()).unwrap(),
        }
    }

    // ---- pages and health ----

    #[tokio::test]
    async fn test_home_page() {
        let server = TestServer::new(setup_test_app().await).unwrap();

        let response = server.get("/").await;

        response.assert_status(StatusCode::OK);
        let content_type = response.header("content-type");
        assert_eq!(content_type.to_str().unwrap(), "text/html; charset=utf-8");
        assert_eq!(response.text(), render_home_page());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = TestServer::new(setup_test_app().await).unwrap();

        let response = server.get("/health").await;

        response.assert_status(StatusCode::OK);
        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "connected");
    }

    // ---- auth ----

    #[tokio::test]
    async fn test_login_and_me() {
        let (server, _state) = setup().await;

        let response = server
            .post("/api/auth/login")
            .json(&LoginRequest {
                username: "alice".to_string(),
                password: TEST_PASSWORD.to_string(),
            })
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert!(body.success);
        assert_eq!(body.message, "登录成功");
        assert_eq!(body.data["tokenType"], "Bearer");
        assert_eq!(body.data["expiresIn"], 24 * 3600);
        assert_eq!(body.data["user"]["apiKey"], api_key_of("alice"));

        let token = body.data["token"].as_str().unwrap().to_string();
        let (name, value) = bearer(&token);
        let me = server.get("/api/auth/me").add_header(name, value).await;

        me.assert_status(StatusCode::OK);
        let me: ApiResponse<Value> = me.json();
        assert_eq!(me.data["username"], "alice");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let (server, _state) = setup().await;

        for (username, password) in [("alice", "nope"), ("nobody", TEST_PASSWORD)] {
            let response = server
                .post("/api/auth/login")
                .json(&json!({ "username": username, "password": password }))
                .await;

            response.assert_status(StatusCode::UNAUTHORIZED);
            let body: ErrorResponse = response.json();
            assert!(!body.success);
            assert_eq!(body.error, BAD_CREDENTIALS);
            assert_eq!(body.code, "UNAUTHORIZED");
        }
    }

    #[tokio::test]
    async fn test_me_requires_valid_token() {
        let (server, _state) = setup().await;

        let missing = server.get("/api/auth/me").await;
        missing.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(missing.json::<ErrorResponse>().error, MISSING_AUTH_HEADER);

        let (name, value) = bearer("not-a-jwt");
        let invalid = server.get("/api/auth/me").add_header(name, value).await;
        invalid.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(invalid.json::<ErrorResponse>().error, INVALID_TOKEN);
    }

    // ---- webhook ----

    #[tokio::test]
    async fn test_webhook_records_transaction() {
        let (server, state) = setup().await;
        let (name, value) = bearer(&api_key_of("alice"));

        let response = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&json!({ "rawContent": SMS, "sender": "95555", "deviceId": "iPhone" }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.message, "账单已记录");
        assert_eq!(body.data["status"], "PENDING");
        assert_eq!(body.data["duplicate"], false);
        assert_eq!(body.data["parsedData"]["type"], "EXPENSE");
        assert_eq!(body.data["parsedData"]["merchant"], "星巴克");
        assert_eq!(
            decimal(&body.data["parsedData"]["amount"]),
            Decimal::from_str("35.50").unwrap()
        );

        let id = body.data["transactionId"].as_i64().unwrap() as i32;
        let stored = transaction::Entity::find_by_id(id)
            .one(&state.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id, user_id(&state, "alice").await);
        assert_eq!(stored.category_id, Some(category_id(&state, "餐饮").await));
    }

    #[tokio::test]
    async fn test_webhook_duplicate_sms() {
        let (server, _state) = setup().await;
        let payload = json!({ "rawContent": SMS, "sender": "95555" });

        let (name, value) = bearer(&api_key_of("alice"));
        let first: ApiResponse<Value> = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&payload)
            .await
            .json();

        let (name, value) = bearer(&api_key_of("alice"));
        let second: ApiResponse<Value> = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&payload)
            .await
            .json();

        assert_eq!(first.data["duplicate"], false);
        assert_eq!(second.data["duplicate"], true);
        assert_eq!(second.data["transactionId"], first.data["transactionId"]);
    }

    #[tokio::test]
    async fn test_webhook_same_sms_from_another_user() {
        let (server, state) = setup().await;
        let payload = json!({ "rawContent": SMS, "sender": "95555" });

        let (name, value) = bearer(&api_key_of("alice"));
        let alice: ApiResponse<Value> = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&payload)
            .await
            .json();

        let (name, value) = bearer(&api_key_of("bob"));
        let bob: ApiResponse<Value> = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&payload)
            .await
            .json();

        assert_eq!(bob.data["duplicate"], false);
        assert_ne!(bob.data["transactionId"], alice.data["transactionId"]);

        let token = token_for(&state, "bob").await;
        let (name, value) = bearer(&token);
        server
            .get(&format!("/api/transactions/{}", bob.data["transactionId"]))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::OK);
    }

    #[tokio::test]
    async fn test_webhook_unparseable_sms_needs_manual_entry() {
        let (server, _state) = setup_with(StubParser::Fails).await;
        let (name, value) = bearer(&api_key_of("alice"));

        let response = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&json!({ "rawContent": "验证码 123456" }))
            .await;

        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.data["status"], "MANUAL");
        assert_eq!(body.data["parsedData"]["merchant"], "待补录");
        assert_eq!(decimal(&body.data["parsedData"]["amount"]), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_webhook_authentication() {
        let (server, _state) = setup().await;
        let payload = json!({ "rawContent": SMS });

        let missing = server.post("/api/webhook/sms").json(&payload).await;
        missing.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(missing.json::<ErrorResponse>().error, MISSING_AUTH_HEADER);

        let (name, value) = bearer("unknown-key");
        let unknown = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&payload)
            .await;
        unknown.assert_status(StatusCode::UNAUTHORIZED);
        assert_eq!(unknown.json::<ErrorResponse>().error, INVALID_API_KEY);
    }

    #[tokio::test]
    async fn test_webhook_rejects_empty_sms() {
        let (server, _state) = setup().await;
        let (name, value) = bearer(&api_key_of("alice"));

        let response = server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&json!({ "rawContent": "" }))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
    }

    // ---- transactions ----

    #[tokio::test]
    async fn test_list_transactions_paging_and_filters() {
        let (server, state) = setup().await;
        let alice = user_id(&state, "alice").await;
        let bob = user_id(&state, "bob").await;
        insert_transaction(&state, alice, TransactionType::Expense, "20.00", "2025-01-01 10:00:00", None).await;
        insert_transaction(&state, alice, TransactionType::Expense, "5.00", "2025-01-02 10:00:00", None).await;
        insert_transaction(&state, alice, TransactionType::Income, "100.00", "2025-01-03 10:00:00", None).await;
        insert_transaction(&state, bob, TransactionType::Expense, "99.00", "2025-01-03 10:00:00", None).await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        let page: ApiResponse<Value> = server
            .get("/api/transactions?page=0&size=2")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(page.data["totalElements"], 3);
        assert_eq!(page.data["totalPages"], 2);
        assert_eq!(page.data["last"], false);
        assert_eq!(page.data["content"].as_array().unwrap().len(), 2);
        // newest first by default
        assert_eq!(page.data["content"][0]["type"], "INCOME");

        let (name, value) = bearer(&token);
        let expenses: ApiResponse<Value> = server
            .get("/api/transactions?type=EXPENSE&sortBy=amount&sortDirection=asc")
            .add_header(name, value)
            .await
            .json();
        let amounts: Vec<Decimal> = expenses.data["content"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| decimal(&t["amount"]))
            .collect();
        assert_eq!(
            amounts,
            vec![Decimal::from_str("5").unwrap(), Decimal::from_str("20").unwrap()]
        );

        let (name, value) = bearer(&token);
        let bounded: ApiResponse<Value> = server
            .get("/api/transactions?startDate=2025-01-02T10:00:00&endDate=2025-01-03T10:00:00")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(bounded.data["totalElements"], 2);
        assert_eq!(bounded.data["last"], true);
    }

    #[tokio::test]
    async fn test_list_transactions_rejects_bad_page_size() {
        let (server, state) = setup().await;
        let token = token_for(&state, "alice").await;

        for size in [0, 101] {
            let (name, value) = bearer(&token);
            let response = server
                .get(&format!("/api/transactions?size={size}"))
                .add_header(name, value)
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_list_transactions_rejects_huge_page() {
        let (server, state) = setup().await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        server
            .get("/api/transactions?page=1000000000000000000&size=100")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let (name, value) = bearer(&token);
        let far: ApiResponse<Value> = server
            .get("/api/transactions?page=1000000&size=100")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(far.data["content"].as_array().unwrap().len(), 0);
        assert_eq!(far.data["last"], true);
    }

    #[tokio::test]
    async fn test_transaction_ownership() {
        let (server, state) = setup().await;
        let bob = user_id(&state, "bob").await;
        let theirs =
            insert_transaction(&state, bob, TransactionType::Expense, "9.90", "2025-01-01 10:00:00", None).await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        let forbidden = server
            .get(&format!("/api/transactions/{}", theirs.id))
            .add_header(name, value)
            .await;
        forbidden.assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&token);
        let missing = server
            .get("/api/transactions/9999")
            .add_header(name, value)
            .await;
        missing.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(
            missing.json::<ErrorResponse>().error,
            "Transaction with ID 9999 not found"
        );
    }

    #[tokio::test]
    async fn test_update_and_delete_transaction() {
        let (server, state) = setup().await;
        let alice = user_id(&state, "alice").await;
        let tx =
            insert_transaction(&state, alice, TransactionType::Expense, "9.90", "2025-01-01 10:00:00", None).await;
        let token = token_for(&state, "alice").await;
        let transport = category_id(&state, "交通").await;

        let (name, value) = bearer(&token);
        let updated = server
            .put(&format!("/api/transactions/{}", tx.id))
            .add_header(name, value)
            .json(&json!({
                "amount": "12.30",
                "remark": "地铁",
                "categoryId": transport,
                "status": "CONFIRMED"
            }))
            .await;
        updated.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = updated.json();
        assert_eq!(decimal(&body.data["amount"]), Decimal::from_str("12.30").unwrap());
        assert_eq!(body.data["remark"], "地铁");
        assert_eq!(body.data["categoryName"], "交通");
        assert_eq!(body.data["status"], "CONFIRMED");
        assert_eq!(body.data["merchant"], "merchant 9.90");

        let (name, value) = bearer(&token);
        server
            .put(&format!("/api/transactions/{}", tx.id))
            .add_header(name, value)
            .json(&json!({ "categoryId": 9999 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (name, value) = bearer(&token);
        server
            .delete(&format!("/api/transactions/{}", tx.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let (name, value) = bearer(&token);
        server
            .get(&format!("/api/transactions/{}", tx.id))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_batch_confirm() {
        let (server, state) = setup().await;
        let alice = user_id(&state, "alice").await;
        let bob = user_id(&state, "bob").await;
        let a = insert_transaction(&state, alice, TransactionType::Expense, "1.00", "2025-01-01 10:00:00", None).await;
        let b = insert_transaction(&state, alice, TransactionType::Expense, "2.00", "2025-01-01 11:00:00", None).await;
        let foreign = insert_transaction(&state, bob, TransactionType::Expense, "3.00", "2025-01-01 12:00:00", None).await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        server
            .post("/api/transactions/batch/confirm")
            .add_header(name, value)
            .json(&json!([a.id, foreign.id]))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        let untouched = transaction::Entity::find_by_id(a.id).one(&state.db).await.unwrap().unwrap();
        assert_eq!(untouched.status, TransactionStatus::Pending);

        let (name, value) = bearer(&token);
        let response = server
            .post("/api/transactions/batch/confirm")
            .add_header(name, value)
            .json(&json!([a.id, b.id, a.id]))
            .await;
        response.assert_status(StatusCode::OK);
        let body: ApiResponse<Value> = response.json();
        assert_eq!(body.message, "批量确认成功");
        assert_eq!(body.data["confirmedCount"], 2);

        let confirmed = transaction::Entity::find()
            .filter(transaction::Column::Status.eq(TransactionStatus::Confirmed))
            .all(&state.db)
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 2);

        let (name, value) = bearer(&token);
        let empty = server
            .post("/api/transactions/batch/confirm")
            .add_header(name, value)
            .json(&json!([]))
            .await;
        empty.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(empty.json::<ErrorResponse>().error, "ids must not be empty");
    }

    // ---- accounts ----

    #[tokio::test]
    async fn test_account_lifecycle() {
        let (server, state) = setup().await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        let created = server
            .post("/api/accounts")
            .add_header(name, value)
            .json(&json!({
                "accountName": "招商银行储蓄卡",
                "accountType": "BANK_CARD",
                "lastFourDigits": "1234"
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let created: ApiResponse<Value> = created.json();
        let id = created.data["id"].as_i64().unwrap();
        assert_eq!(created.data["isActive"], true);
        assert_eq!(decimal(&created.data["balance"]), Decimal::ZERO);

        // an SMS for that card is booked on the account
        let (name, value) = bearer(&api_key_of("alice"));
        server
            .post("/api/webhook/sms")
            .add_header(name, value)
            .json(&json!({ "rawContent": SMS }))
            .await
            .assert_status(StatusCode::OK);

        let (name, value) = bearer(&token);
        let list: ApiResponse<Value> = server.get("/api/accounts").add_header(name, value).await.json();
        assert_eq!(list.data.as_array().unwrap().len(), 1);
        assert_eq!(list.data[0]["transactionCount"], 1);

        let (name, value) = bearer(&token);
        let toggled: ApiResponse<Value> = server
            .post(&format!("/api/accounts/{id}/toggle"))
            .add_header(name, value)
            .await
            .json();
        assert_eq!(toggled.data["isActive"], false);

        let (name, value) = bearer(&token_for(&state, "bob").await);
        server
            .delete(&format!("/api/accounts/{id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&token);
        server
            .delete(&format!("/api/accounts/{id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);

        // the transaction survives without its account
        let remaining = transaction::Entity::find().all(&state.db).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].account_id, None);
    }

    #[tokio::test]
    async fn test_create_account_validation() {
        let (server, state) = setup().await;
        let (name, value) = bearer(&token_for(&state, "alice").await);

        server
            .post("/api/accounts")
            .add_header(name, value)
            .json(&json!({
                "accountName": "Card",
                "accountType": "BANK_CARD",
                "lastFourDigits": "12"
            }))
            .await
            .assert_status(StatusCode::BAD_REQUEST);

        let card = json!({
            "accountName": "Card",
            "accountType": "BANK_CARD",
            "lastFourDigits": "8888"
        });
        let token = token_for(&state, "alice").await;
        let (name, value) = bearer(&token);
        server
            .post("/api/accounts")
            .add_header(name, value)
            .json(&card)
            .await
            .assert_status(StatusCode::CREATED);

        let (name, value) = bearer(&token);
        let duplicate = server.post("/api/accounts").add_header(name, value).json(&card).await;
        duplicate.assert_status(StatusCode::CONFLICT);
        assert_eq!(duplicate.json::<ErrorResponse>().code, "CONFLICT");
    }

    // ---- categories ----

    #[tokio::test]
    async fn test_categories_listing() {
        let (server, state) = setup().await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        let all: ApiResponse<Value> = server.get("/api/categories").add_header(name, value).await.json();
        assert_eq!(all.data.as_array().unwrap().len(), 12);

        let (name, value) = bearer(&token);
        let income: ApiResponse<Value> = server
            .get("/api/categories?type=INCOME")
            .add_header(name, value)
            .await
            .json();
        let names: Vec<&str> = income
            .data
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["工资", "奖金", "理财", "其他收入"]);
    }

    #[tokio::test]
    async fn test_category_permissions() {
        let (server, state) = setup().await;
        let token = token_for(&state, "alice").await;
        let food = category_id(&state, "餐饮").await;

        let (name, value) = bearer(&token);
        let created = server
            .post("/api/categories")
            .add_header(name, value)
            .json(&json!({ "name": "咖啡", "type": "EXPENSE", "parentId": food, "sortOrder": 10 }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let created: ApiResponse<Value> = created.json();
        let id = created.data["id"].as_i64().unwrap();
        assert_eq!(created.data["parentName"], "餐饮");
        assert_eq!(created.data["isSystem"], false);

        let (name, value) = bearer(&token);
        let system = server
            .put(&format!("/api/categories/{food}"))
            .add_header(name, value)
            .json(&json!({ "name": "吃饭" }))
            .await;
        system.assert_status(StatusCode::FORBIDDEN);
        assert_eq!(system.json::<ErrorResponse>().error, "系统分类不可修改");

        let (name, value) = bearer(&token_for(&state, "bob").await);
        server
            .get(&format!("/api/categories/{id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let (name, value) = bearer(&token);
        server
            .post("/api/categories")
            .add_header(name, value)
            .json(&json!({ "name": "孤儿", "type": "EXPENSE", "parentId": 9999 }))
            .await
            .assert_status(StatusCode::NOT_FOUND);

        let (name, value) = bearer(&token);
        server
            .delete(&format!("/api/categories/{id}"))
            .add_header(name, value)
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_category_tree_rules() {
        let (server, state) = setup().await;
        let token = token_for(&state, "alice").await;

        let mut ids = Vec::new();
        let mut parent: Option<i64> = None;
        for name in ["出行", "打车", "拼车"] {
            let (header, value) = bearer(&token);
            let created: ApiResponse<Value> = server
                .post("/api/categories")
                .add_header(header, value)
                .json(&json!({ "name": name, "type": "EXPENSE", "parentId": parent }))
                .await
                .json();
            let id = created.data["id"].as_i64().unwrap();
            ids.push(id);
            parent = Some(id);
        }
        let (root, child, grandchild) = (ids[0], ids[1], ids[2]);

        // moving a category under its own descendant would close a loop
        for descendant in [child, grandchild] {
            let (name, value) = bearer(&token);
            let response = server
                .put(&format!("/api/categories/{root}"))
                .add_header(name, value)
                .json(&json!({ "parentId": descendant }))
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            assert_eq!(response.json::<ErrorResponse>().error, "父分类不能是自身或其子分类");
        }

        let (name, value) = bearer(&token);
        let blocked = server
            .delete(&format!("/api/categories/{child}"))
            .add_header(name, value)
            .await;
        blocked.assert_status(StatusCode::CONFLICT);

        for id in [grandchild, child, root] {
            let (name, value) = bearer(&token);
            server
                .delete(&format!("/api/categories/{id}"))
                .add_header(name, value)
                .await
                .assert_status(StatusCode::NO_CONTENT);
        }
    }

    // ---- stats ----

    #[tokio::test]
    async fn test_stats_summary_and_categories() {
        let (server, state) = setup().await;
        let alice = user_id(&state, "alice").await;
        let food = category_id(&state, "餐饮").await;
        let transport = category_id(&state, "交通").await;
        let salary = category_id(&state, "工资").await;
        insert_transaction(&state, alice, TransactionType::Income, "8000.00", "2025-01-01 09:00:00", Some(salary)).await;
        insert_transaction(&state, alice, TransactionType::Expense, "75.00", "2025-01-10 12:00:00", Some(food)).await;
        insert_transaction(&state, alice, TransactionType::Expense, "25.00", "2025-01-31 23:59:59", Some(transport)).await;
        insert_transaction(&state, alice, TransactionType::Expense, "500.00", "2025-02-01 00:00:00", Some(food)).await;
        let token = token_for(&state, "alice").await;

        let (name, value) = bearer(&token);
        let summary: ApiResponse<Value> = server
            .get("/api/stats/summary?startDate=2025-01-01T09:00:00&endDate=2025-01-31T23:59:59")
            .add_header(name, value)
            .await
            .json();
        assert_eq!(decimal(&summary.data["totalIncome"]), Decimal::from(8000));
        assert_eq!(decimal(&summary.data["totalExpense"]), Decimal::from(100));
        assert_eq!(decimal(&summary.data["balance"]), Decimal::from(7900));
        assert_eq!(summary.data["transactionCount"], 3);

        let (name, value) = bearer(&token);
        let breakdown: ApiResponse<Value> = server
            .get("/api/stats/categories?type=EXPENSE&endDate=2025-01-31T23:59:59")
            .add_header(name, value)
            .await
            .json();
        let rows = breakdown.data.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["categoryName"], "餐饮");
        assert_eq!(rows[0]["percentage"].as_f64().unwrap().round(), 75.0);
        assert_eq!(rows[1]["categoryName"], "交通");

        let (name, value) = bearer(&token);
        server
            .get("/api/stats/summary?startDate=2025-02-01T00:00:00&endDate=2025-01-01T00:00:00")
            .add_header(name, value)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats_require_login() {
        let (server, _state) = setup().await;

        server
            .get("/api/stats/summary")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_default_app_state_has_seeded_users() {
        let state = setup_test_app_state().await;

        assert!(user::Entity::find_by_api_key(&state.db, &api_key_of("bob"))
            .await
            .unwrap()
            .is_some());
    }
}
