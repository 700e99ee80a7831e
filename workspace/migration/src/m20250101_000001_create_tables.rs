use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Create users table
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_auto(Users::Id))
                    .col(string_len(Users::Username, 50).unique_key())
                    .col(string_len_null(Users::Email, 100).unique_key())
                    .col(string_len_null(Users::Phone, 20).unique_key())
                    .col(string(Users::PasswordHash))
                    .col(string_len(Users::ApiKey, 64).unique_key())
                    .col(date_time(Users::CreatedAt))
                    .col(date_time(Users::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Create accounts table
        manager
            .create_table(
                Table::create()
                    .table(Accounts::Table)
                    .if_not_exists()
                    .col(pk_auto(Accounts::Id))
                    .col(integer(Accounts::UserId))
                    .col(string_len(Accounts::AccountName, 100))
                    .col(string_len(Accounts::AccountType, 20))
                    .col(string_len_null(Accounts::LastFourDigits, 4))
                    .col(string_len_null(Accounts::SourceIdentifier, 100))
                    .col(decimal_len(Accounts::Balance, 16, 2).default(0))
                    .col(boolean(Accounts::IsActive).default(true))
                    .col(date_time(Accounts::CreatedAt))
                    .col(date_time(Accounts::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_account_user")
                            .from(Accounts::Table, Accounts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create categories table; user_id NULL marks a system preset
        manager
            .create_table(
                Table::create()
                    .table(Categories::Table)
                    .if_not_exists()
                    .col(pk_auto(Categories::Id))
                    .col(integer_null(Categories::UserId))
                    .col(integer_null(Categories::ParentId))
                    .col(string_len(Categories::Name, 50))
                    .col(string_len_null(Categories::Icon, 50))
                    .col(string_len_null(Categories::Color, 20))
                    .col(string_len(Categories::CategoryType, 10))
                    .col(boolean(Categories::IsSystem).default(false))
                    .col(integer(Categories::SortOrder).default(0))
                    .col(date_time(Categories::CreatedAt))
                    .col(date_time(Categories::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_category_user")
                            .from(Categories::Table, Categories::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_category_parent")
                            .from(Categories::Table, Categories::ParentId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create raw_sms_logs table
        manager
            .create_table(
                Table::create()
                    .table(RawSmsLogs::Table)
                    .if_not_exists()
                    .col(pk_auto(RawSmsLogs::Id))
                    .col(integer(RawSmsLogs::UserId))
                    .col(string_len(RawSmsLogs::Sender, 50))
                    .col(text(RawSmsLogs::FullContent))
                    .col(text_null(RawSmsLogs::AiResponse))
                    .col(string_len_null(RawSmsLogs::DeviceInfo, 100))
                    .col(string_len(RawSmsLogs::ParseStatus, 20))
                    .col(text_null(RawSmsLogs::ErrorMessage))
                    .col(date_time(RawSmsLogs::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_raw_sms_log_user")
                            .from(RawSmsLogs::Table, RawSmsLogs::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Create transactions table
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(pk_auto(Transactions::Id))
                    .col(integer(Transactions::UserId))
                    .col(integer_null(Transactions::AccountId))
                    .col(integer_null(Transactions::CategoryId))
                    .col(string_len(Transactions::TransactionType, 10))
                    .col(decimal_len(Transactions::Amount, 16, 2))
                    .col(string_len_null(Transactions::Merchant, 200))
                    .col(date_time(Transactions::TransactionTime))
                    .col(integer_null(Transactions::RawLogId))
                    .col(string_len(Transactions::Status, 20))
                    .col(string_len_null(Transactions::Remark, 500))
                    .col(string_len_null(Transactions::IdempotencyKey, 64))
                    .col(date_time(Transactions::CreatedAt))
                    .col(date_time(Transactions::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_user")
                            .from(Transactions::Table, Transactions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_account")
                            .from(Transactions::Table, Transactions::AccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_category")
                            .from(Transactions::Table, Transactions::CategoryId)
                            .to(Categories::Table, Categories::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_transaction_raw_log")
                            .from(Transactions::Table, Transactions::RawLogId)
                            .to(RawSmsLogs::Table, RawSmsLogs::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_time")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::TransactionTime)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_transactions_user_idempotency_key")
                    .table(Transactions::Table)
                    .col(Transactions::UserId)
                    .col(Transactions::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_accounts_user_last_four")
                    .table(Accounts::Table)
                    .col(Accounts::UserId)
                    .col(Accounts::LastFourDigits)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop tables in reverse order of creation
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RawSmsLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Categories::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Accounts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Email,
    Phone,
    PasswordHash,
    ApiKey,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Accounts {
    Table,
    Id,
    UserId,
    AccountName,
    AccountType,
    LastFourDigits,
    SourceIdentifier,
    Balance,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Categories {
    Table,
    Id,
    UserId,
    ParentId,
    Name,
    Icon,
    Color,
    CategoryType,
    IsSystem,
    SortOrder,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RawSmsLogs {
    Table,
    Id,
    UserId,
    Sender,
    FullContent,
    AiResponse,
    DeviceInfo,
    ParseStatus,
    ErrorMessage,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    UserId,
    AccountId,
    CategoryId,
    TransactionType,
    Amount,
    Merchant,
    TransactionTime,
    RawLogId,
    Status,
    Remark,
    IdempotencyKey,
    CreatedAt,
    UpdatedAt,
}
