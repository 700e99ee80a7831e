use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ConnectionTrait, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use super::category::TransactionType;

/// Review state of a transaction.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Created from an SMS, waiting for the user to confirm it.
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "CONFIRMED")]
    Confirmed,
    /// The SMS could not be parsed; the user has to fill the details in.
    #[sea_orm(string_value = "MANUAL")]
    Manual,
}

/// A single bill entry.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub account_id: Option<i32>,
    pub category_id: Option<i32>,
    pub transaction_type: TransactionType,
    /// Always non-negative; the direction is carried by `transaction_type`.
    #[sea_orm(column_type = "Decimal(Some((16, 2)))")]
    pub amount: Decimal,
    pub merchant: Option<String>,
    pub transaction_time: DateTime,
    /// The SMS log this transaction was extracted from.
    pub raw_log_id: Option<i32>,
    pub status: TransactionStatus,
    pub remark: Option<String>,
    /// Deduplicates repeated deliveries of the same SMS. Unique per user.
    pub idempotency_key: Option<String>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::account::Entity",
        from = "Column::AccountId",
        to = "super::account::Column::Id",
        on_delete = "SetNull"
    )]
    Account,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "SetNull"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::raw_sms_log::Entity",
        from = "Column::RawLogId",
        to = "super::raw_sms_log::Column::Id",
        on_delete = "SetNull"
    )]
    RawSmsLog,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::account::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Account.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = crate::now();
        if insert {
            self.created_at = Set(now);
        }
        self.updated_at = Set(now);
        Ok(self)
    }
}

impl Entity {
    pub async fn find_by_idempotency_key<C>(
        db: &C,
        user_id: i32,
        key: &str,
    ) -> Result<Option<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Self::find()
            .filter(Column::UserId.eq(user_id))
            .filter(Column::IdempotencyKey.eq(key))
            .one(db)
            .await
    }

    /// Transactions of `user_id` whose time falls within the inclusive bounds.
    /// Either bound may be omitted.
    pub fn find_for_user_between(
        user_id: i32,
        start: Option<DateTime>,
        end: Option<DateTime>,
    ) -> Select<Entity> {
        let mut query = Self::find().filter(Column::UserId.eq(user_id));
        if let Some(start) = start {
            query = query.filter(Column::TransactionTime.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(Column::TransactionTime.lte(end));
        }
        query
    }
}
