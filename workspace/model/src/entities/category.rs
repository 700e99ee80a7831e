use sea_orm::entity::prelude::*;
use sea_orm::{Condition, ConnectionTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Direction of money flow; shared by categories and transactions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[sea_orm(string_value = "INCOME")]
    Income,
    #[sea_orm(string_value = "EXPENSE")]
    Expense,
}

/// A transaction category.
///
/// Categories with `user_id = NULL` are system presets shared by every user;
/// they are flagged `is_system` and cannot be modified through the API.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: Option<i32>,
    pub parent_id: Option<i32>,
    pub name: String,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub category_type: TransactionType,
    #[sea_orm(default_value = "false")]
    pub is_system: bool,
    #[sea_orm(default_value = "0")]
    pub sort_order: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(belongs_to = "Entity", from = "Column::ParentId", to = "Column::Id")]
    Parent,
    #[sea_orm(has_many = "super::transaction::Entity")]
    Transaction,
}

impl Related<super::transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transaction.def()
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

impl Model {
    /// True when `user_id` may see this category (own or system preset).
    pub fn is_visible_to(&self, user_id: i32) -> bool {
        self.user_id.is_none() || self.user_id == Some(user_id)
    }

    /// Gets all direct children of this category.
    pub async fn get_children<C>(&self, db: &C) -> Result<Vec<Model>, DbErr>
    where
        C: ConnectionTrait,
    {
        Entity::find()
            .filter(Column::ParentId.eq(self.id))
            .all(db)
            .await
    }
}

impl Entity {
    /// Ids on the parent chain of `id`, nearest first, not including `id`.
    ///
    /// Stops at a root or on the first id seen twice.
    pub async fn ancestor_ids<C>(db: &C, id: i32) -> Result<Vec<i32>, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut chain = Vec::new();
        let mut current = Self::find_by_id(id).one(db).await?.and_then(|c| c.parent_id);
        while let Some(parent_id) = current {
            if parent_id == id || chain.contains(&parent_id) {
                break;
            }
            chain.push(parent_id);
            current = Self::find_by_id(parent_id)
                .one(db)
                .await?
                .and_then(|c| c.parent_id);
        }
        Ok(chain)
    }

    /// Categories visible to `user_id`: the user's own plus the system presets,
    /// ordered by `sort_order` then id.
    pub fn find_visible_to(user_id: i32) -> Select<Entity> {
        Self::find()
            .filter(
                Condition::any()
                    .add(Column::UserId.eq(user_id))
                    .add(Column::UserId.is_null()),
            )
            .order_by_asc(Column::SortOrder)
            .order_by_asc(Column::Id)
    }
}
