use compute::{
    idempotency_key, parse_transaction_time, ComputeError, IdempotencyGuard, ParsedTransaction,
};
use model::entities::{
    account, category,
    category::TransactionType,
    raw_sms_log::{self, ParseStatus},
    transaction::{self, TransactionStatus},
    user,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

use super::parser::TransactionParser;
use crate::schemas::AppState;

pub const UNPARSEABLE_MESSAGE: &str = "AI 无法解析出有效数据";
pub const MANUAL_MERCHANT: &str = "待补录";
pub const FAILED_MERCHANT: &str = "解析失败";
pub const FAILED_REMARK: &str = "AI 解析失败，请手动编辑";

/// An SMS as forwarded by the iOS shortcut.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    /// Full SMS text
    #[validate(length(min = 1, message = "rawContent must not be empty"))]
    pub raw_content: String,
    /// Sender number, e.g. `95555`
    #[serde(default)]
    pub sender: Option<String>,
    /// When the phone received the SMS, as reported by the shortcut
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
}

/// What happened to an incoming SMS.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub transaction: transaction::Model,
    /// The SMS had been processed before; `transaction` is the earlier one.
    pub duplicate: bool,
    pub parse_status: ParseStatus,
}

#[derive(Debug, Error)]
enum ProcessError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error(transparent)]
    Compute(#[from] ComputeError),
    #[error("Could not store AI response: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Runs an SMS through parsing, deduplication and storage.
///
/// Every SMS ends up as a transaction of some kind: a parsed one waiting
/// for confirmation, a manual placeholder when nothing could be read, or a
/// failure placeholder when storage went wrong after parsing. The raw text
/// is always kept in `raw_sms_logs`.
#[derive(Debug, Clone)]
pub struct SmsProcessor {
    db: DatabaseConnection,
    parser: Arc<dyn TransactionParser>,
    idempotency: IdempotencyGuard,
}

impl SmsProcessor {
    pub fn new(
        db: DatabaseConnection,
        parser: Arc<dyn TransactionParser>,
        idempotency: IdempotencyGuard,
    ) -> Self {
        Self {
            db,
            parser,
            idempotency,
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            state.db.clone(),
            state.parser.clone(),
            state.idempotency.clone(),
        )
    }

    #[instrument(skip(self, user, message), fields(user_id = user.id))]
    pub async fn process(
        &self,
        user: &user::Model,
        message: &SmsMessage,
    ) -> Result<ProcessOutcome, DbErr> {
        let sender = message.sender.clone().unwrap_or_default();
        info!("Processing SMS for user {} from {}", user.username, sender);

        let log = raw_sms_log::ActiveModel {
            user_id: Set(user.id),
            sender: Set(sender.clone()),
            full_content: Set(message.raw_content.clone()),
            device_info: Set(message.device_id.clone()),
            parse_status: Set(ParseStatus::Pending),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;
        debug!("Stored raw SMS log {}", log.id);

        let parsed = match self.parser.parse(&message.raw_content, &sender).await {
            Ok(Some(parsed)) if parsed.amount.is_some() => parsed,
            Ok(_) => {
                warn!("AI found no amount in SMS, waiting for manual entry");
                return self.manual_entry(user, log).await;
            }
            Err(e) => {
                error!("AI parsing failed: {}", e);
                return self.manual_entry(user, log).await;
            }
        };

        match self.record(user, &log, &parsed, &message.raw_content).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!("Failed to process SMS: {}", e);
                self.failure_entry(user, log, e.to_string()).await
            }
        }
    }

    async fn record(
        &self,
        user: &user::Model,
        log: &raw_sms_log::Model,
        parsed: &ParsedTransaction,
        raw_content: &str,
    ) -> Result<ProcessOutcome, ProcessError> {
        let ai_response = serde_json::to_string(parsed)?;
        let amount = parsed.amount.unwrap_or_default().abs();

        let key = idempotency_key(
            user.id,
            parsed.card_last_four.as_deref(),
            amount,
            parsed.merchant.as_deref(),
            raw_content,
        );

        let fresh = self.idempotency.check_and_set(&key).await;
        if let Some(existing) = transaction::Entity::find_by_idempotency_key(&self.db, user.id, &key).await? {
            warn!("Duplicate SMS detected, idempotency key: {}", key);
            return self.duplicate(log, ai_response, existing).await;
        }
        if !fresh {
            debug!("Idempotency key {} seen before but nothing stored, processing again", key);
        }

        let result = self.store(user, log, parsed, amount, &key, ai_response).await;
        if result.is_err() {
            self.idempotency.forget(&key).await;
        }
        result
    }

    async fn store(
        &self,
        user: &user::Model,
        log: &raw_sms_log::Model,
        parsed: &ParsedTransaction,
        amount: Decimal,
        key: &str,
        ai_response: String,
    ) -> Result<ProcessOutcome, ProcessError> {
        let kind = parsed.resolved_type()?;

        let account = match parsed.card_last_four.as_deref().map(str::trim) {
            Some(last_four) if !last_four.is_empty() => {
                account::Entity::find_by_last_four(&self.db, user.id, last_four).await?
            }
            _ => None,
        };

        let category = match parsed.category_hint.as_deref().map(str::trim) {
            Some(hint) if !hint.is_empty() => {
                self.find_category(user.id, kind, hint).await?
            }
            _ => None,
        };

        let inserted = transaction::ActiveModel {
            user_id: Set(user.id),
            account_id: Set(account.as_ref().map(|a| a.id)),
            category_id: Set(category.as_ref().map(|c| c.id)),
            transaction_type: Set(kind),
            amount: Set(amount),
            merchant: Set(parsed.merchant.clone()),
            transaction_time: Set(parse_transaction_time(
                parsed.transaction_time.as_deref(),
                model::now(),
            )),
            raw_log_id: Set(Some(log.id)),
            status: Set(TransactionStatus::Pending),
            idempotency_key: Set(Some(key.to_string())),
            ..Default::default()
        }
        .insert(&self.db)
        .await;

        let transaction = match inserted {
            Ok(transaction) => transaction,
            // a concurrent delivery of the same SMS won the unique key
            Err(e) => match transaction::Entity::find_by_idempotency_key(&self.db, user.id, key).await? {
                Some(existing) => return self.duplicate(log, ai_response, existing).await,
                None => return Err(e.into()),
            },
        };

        self.update_log(log, ParseStatus::Success, Some(ai_response), None)
            .await?;
        info!("Transaction {} created from SMS", transaction.id);

        Ok(ProcessOutcome {
            transaction,
            duplicate: false,
            parse_status: ParseStatus::Success,
        })
    }

    /// A category of `kind` visible to the user whose name matches `hint`.
    async fn find_category(
        &self,
        user_id: i32,
        kind: TransactionType,
        hint: &str,
    ) -> Result<Option<category::Model>, DbErr> {
        category::Entity::find_visible_to(user_id)
            .filter(category::Column::CategoryType.eq(kind))
            .filter(category::Column::Name.eq(hint))
            .one(&self.db)
            .await
    }

    async fn duplicate(
        &self,
        log: &raw_sms_log::Model,
        ai_response: String,
        existing: transaction::Model,
    ) -> Result<ProcessOutcome, ProcessError> {
        self.update_log(log, ParseStatus::Duplicate, Some(ai_response), None)
            .await?;
        Ok(ProcessOutcome {
            transaction: existing,
            duplicate: true,
            parse_status: ParseStatus::Duplicate,
        })
    }

    async fn manual_entry(
        &self,
        user: &user::Model,
        log: raw_sms_log::Model,
    ) -> Result<ProcessOutcome, DbErr> {
        self.update_log(&log, ParseStatus::Failed, None, Some(UNPARSEABLE_MESSAGE.to_string()))
            .await?;

        let transaction = transaction::ActiveModel {
            user_id: Set(user.id),
            transaction_type: Set(TransactionType::Expense),
            amount: Set(Decimal::ZERO),
            merchant: Set(Some(MANUAL_MERCHANT.to_string())),
            transaction_time: Set(model::now()),
            raw_log_id: Set(Some(log.id)),
            status: Set(TransactionStatus::Manual),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(ProcessOutcome {
            transaction,
            duplicate: false,
            parse_status: ParseStatus::Failed,
        })
    }

    async fn failure_entry(
        &self,
        user: &user::Model,
        log: raw_sms_log::Model,
        reason: String,
    ) -> Result<ProcessOutcome, DbErr> {
        self.update_log(&log, ParseStatus::Error, None, Some(reason))
            .await?;

        let transaction = transaction::ActiveModel {
            user_id: Set(user.id),
            transaction_type: Set(TransactionType::Expense),
            amount: Set(Decimal::ZERO),
            merchant: Set(Some(FAILED_MERCHANT.to_string())),
            transaction_time: Set(model::now()),
            raw_log_id: Set(Some(log.id)),
            status: Set(TransactionStatus::Pending),
            remark: Set(Some(FAILED_REMARK.to_string())),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        Ok(ProcessOutcome {
            transaction,
            duplicate: false,
            parse_status: ParseStatus::Error,
        })
    }

    /// Sets the final status of a log; `None` leaves a column untouched.
    async fn update_log(
        &self,
        log: &raw_sms_log::Model,
        status: ParseStatus,
        ai_response: Option<String>,
        error_message: Option<String>,
    ) -> Result<raw_sms_log::Model, DbErr> {
        let mut active: raw_sms_log::ActiveModel = log.clone().into();
        active.parse_status = Set(status);
        if let Some(ai_response) = ai_response {
            active.ai_response = Set(Some(ai_response));
        }
        if let Some(error_message) = error_message {
            active.error_message = Set(Some(error_message));
        }
        active.update(&self.db).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_utils::{create_test_user, setup_test_db, StubParser};
    use sea_orm::{EntityTrait, PaginatorTrait};
    use std::str::FromStr;

    const SMS: &str = "【招商银行】您尾号1234的储蓄卡1月15日14:30消费35.50元，商户：星巴克";

    fn message(raw: &str) -> SmsMessage {
        SmsMessage {
            raw_content: raw.to_string(),
            sender: Some("95555".to_string()),
            timestamp: None,
            device_id: Some("iPhone".to_string()),
        }
    }

    fn starbucks() -> ParsedTransaction {
        ParsedTransaction {
            transaction_type: Some("EXPENSE".to_string()),
            amount: Some(Decimal::from_str("35.50").unwrap()),
            merchant: Some("星巴克".to_string()),
            card_last_four: Some("1234".to_string()),
            transaction_time: Some("2025-01-15T14:30:00".to_string()),
            category_hint: Some("餐饮".to_string()),
        }
    }

    async fn processor(db: &DatabaseConnection, parser: StubParser) -> SmsProcessor {
        SmsProcessor::new(db.clone(), Arc::new(parser), IdempotencyGuard::default())
    }

    async fn log_of(db: &DatabaseConnection, outcome: &ProcessOutcome) -> raw_sms_log::Model {
        let log_id = outcome.transaction.raw_log_id.unwrap();
        raw_sms_log::Entity::find_by_id(log_id)
            .one(db)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_parsed_sms_becomes_pending_transaction() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;
        let card = account::ActiveModel {
            user_id: Set(user.id),
            account_name: Set("招商银行储蓄卡".to_string()),
            account_type: Set(account::AccountType::BankCard),
            last_four_digits: Set(Some("1234".to_string())),
            balance: Set(Decimal::ZERO),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&db)
        .await
        .unwrap();

        let processor = processor(&db, StubParser::Returns(Some(starbucks()))).await;
        let outcome = processor.process(&user, &message(SMS)).await.unwrap();

        let tx = &outcome.transaction;
        assert!(!outcome.duplicate);
        assert_eq!(outcome.parse_status, ParseStatus::Success);
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert_eq!(tx.transaction_type, TransactionType::Expense);
        assert_eq!(tx.amount, Decimal::from_str("35.50").unwrap());
        assert_eq!(tx.merchant.as_deref(), Some("星巴克"));
        assert_eq!(tx.account_id, Some(card.id));
        assert_eq!(tx.idempotency_key.as_ref().map(String::len), Some(64));
        assert_eq!(tx.transaction_time.to_string(), "2025-01-15 14:30:00");

        let category = category::Entity::find_by_id(tx.category_id.unwrap())
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(category.name, "餐饮");

        let log = log_of(&db, &outcome).await;
        assert_eq!(log.parse_status, ParseStatus::Success);
        assert_eq!(log.full_content, SMS);
        assert_eq!(log.sender, "95555");
        assert!(log.ai_response.unwrap().contains("星巴克"));
    }

    #[tokio::test]
    async fn test_same_sms_twice_is_a_duplicate() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;
        let processor = processor(&db, StubParser::Returns(Some(starbucks()))).await;

        let first = processor.process(&user, &message(SMS)).await.unwrap();
        let second = processor.process(&user, &message(SMS)).await.unwrap();

        assert!(second.duplicate);
        assert_eq!(second.parse_status, ParseStatus::Duplicate);
        assert_eq!(second.transaction.id, first.transaction.id);
        assert_eq!(transaction::Entity::find().count(&db).await.unwrap(), 1);
        assert_eq!(raw_sms_log::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_same_sms_from_two_users_is_stored_for_each() {
        let db = setup_test_db().await;
        let alice = create_test_user(&db, "alice").await;
        let bob = create_test_user(&db, "bob").await;
        let processor = processor(&db, StubParser::Returns(Some(starbucks()))).await;

        let first = processor.process(&alice, &message(SMS)).await.unwrap();
        let second = processor.process(&bob, &message(SMS)).await.unwrap();

        assert!(!second.duplicate);
        assert_eq!(second.parse_status, ParseStatus::Success);
        assert_ne!(second.transaction.id, first.transaction.id);
        assert_eq!(second.transaction.user_id, bob.id);
        assert_eq!(transaction::Entity::find().count(&db).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_detected_from_database_after_restart() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;

        let first = processor(&db, StubParser::Returns(Some(starbucks())))
            .await
            .process(&user, &message(SMS))
            .await
            .unwrap();
        // a fresh processor has an empty in-memory guard
        let second = processor(&db, StubParser::Returns(Some(starbucks())))
            .await
            .process(&user, &message(SMS))
            .await
            .unwrap();

        assert!(second.duplicate);
        assert_eq!(second.transaction.id, first.transaction.id);
    }

    #[tokio::test]
    async fn test_missing_amount_creates_manual_entry() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;
        let parsed = ParsedTransaction {
            amount: None,
            ..starbucks()
        };

        let outcome = processor(&db, StubParser::Returns(Some(parsed)))
            .await
            .process(&user, &message(SMS))
            .await
            .unwrap();

        assert_eq!(outcome.parse_status, ParseStatus::Failed);
        assert_eq!(outcome.transaction.status, TransactionStatus::Manual);
        assert_eq!(outcome.transaction.amount, Decimal::ZERO);
        assert_eq!(outcome.transaction.merchant.as_deref(), Some(MANUAL_MERCHANT));

        let log = log_of(&db, &outcome).await;
        assert_eq!(log.parse_status, ParseStatus::Failed);
        assert_eq!(log.error_message.as_deref(), Some(UNPARSEABLE_MESSAGE));
    }

    #[tokio::test]
    async fn test_parser_error_creates_manual_entry() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;

        let outcome = processor(&db, StubParser::Fails)
            .await
            .process(&user, &message(SMS))
            .await
            .unwrap();

        assert_eq!(outcome.transaction.status, TransactionStatus::Manual);
        assert_eq!(log_of(&db, &outcome).await.parse_status, ParseStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_type_creates_failure_entry() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;
        let parsed = ParsedTransaction {
            transaction_type: Some("TRANSFER".to_string()),
            ..starbucks()
        };
        let guard = IdempotencyGuard::default();
        let processor = SmsProcessor::new(
            db.clone(),
            Arc::new(StubParser::Returns(Some(parsed))),
            guard.clone(),
        );

        let outcome = processor.process(&user, &message(SMS)).await.unwrap();

        assert_eq!(outcome.parse_status, ParseStatus::Error);
        assert_eq!(outcome.transaction.status, TransactionStatus::Pending);
        assert_eq!(outcome.transaction.merchant.as_deref(), Some(FAILED_MERCHANT));
        assert_eq!(outcome.transaction.remark.as_deref(), Some(FAILED_REMARK));
        assert_eq!(outcome.transaction.idempotency_key, None);

        let log = log_of(&db, &outcome).await;
        assert_eq!(log.parse_status, ParseStatus::Error);
        assert!(log.error_message.unwrap().contains("TRANSFER"));

        // the key is released so a corrected retry is not treated as a duplicate
        let key = idempotency_key(user.id, Some("1234"), Decimal::from_str("35.50").unwrap(), Some("星巴克"), SMS);
        assert!(!guard.contains(&key));
    }

    #[tokio::test]
    async fn test_negative_amount_is_stored_positive() {
        let db = setup_test_db().await;
        let user = create_test_user(&db, "alice").await;
        let parsed = ParsedTransaction {
            amount: Some(Decimal::from_str("-12.00").unwrap()),
            card_last_four: None,
            category_hint: Some("不存在的分类".to_string()),
            ..starbucks()
        };

        let outcome = processor(&db, StubParser::Returns(Some(parsed)))
            .await
            .process(&user, &message("退款短信"))
            .await
            .unwrap();

        assert_eq!(outcome.transaction.amount, Decimal::from_str("12.00").unwrap());
        assert_eq!(outcome.transaction.account_id, None);
        assert_eq!(outcome.transaction.category_id, None);
    }
}
