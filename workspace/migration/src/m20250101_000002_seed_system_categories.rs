use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// (name, icon, type, sort_order) of the presets every user sees.
const SYSTEM_CATEGORIES: &[(&str, &str, &str, i32)] = &[
    ("餐饮", "🍜", "EXPENSE", 1),
    ("交通", "🚗", "EXPENSE", 2),
    ("购物", "🛍️", "EXPENSE", 3),
    ("娱乐", "🎮", "EXPENSE", 4),
    ("住房", "🏠", "EXPENSE", 5),
    ("医疗", "💊", "EXPENSE", 6),
    ("教育", "📚", "EXPENSE", 7),
    ("其他支出", "📦", "EXPENSE", 99),
    ("工资", "💼", "INCOME", 1),
    ("奖金", "🎁", "INCOME", 2),
    ("理财", "📈", "INCOME", 3),
    ("其他收入", "💰", "INCOME", 99),
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut insert = Query::insert();
        insert.into_table(Categories::Table).columns([
            Categories::Name,
            Categories::Icon,
            Categories::CategoryType,
            Categories::IsSystem,
            Categories::SortOrder,
            Categories::CreatedAt,
            Categories::UpdatedAt,
        ]);

        for (name, icon, category_type, sort_order) in SYSTEM_CATEGORIES {
            insert
                .values([
                    (*name).into(),
                    (*icon).into(),
                    (*category_type).into(),
                    true.into(),
                    (*sort_order).into(),
                    Expr::current_timestamp().into(),
                    Expr::current_timestamp().into(),
                ])
                .map_err(|e| DbErr::Migration(e.to_string()))?;
        }

        manager.exec_stmt(insert).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .exec_stmt(
                Query::delete()
                    .from_table(Categories::Table)
                    .and_where(Expr::col(Categories::IsSystem).eq(true))
                    .and_where(Expr::col(Categories::UserId).is_null())
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    UserId,
    Name,
    Icon,
    CategoryType,
    IsSystem,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}
