use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden, Clone, Copy)]
enum Users {
    Table,
    Email,
    Status,
}

#[derive(Iden, Clone, Copy)]
enum Accounts {
    Table,
    UserId,
    Status,
    ProviderAccountId,
}

#[derive(Iden, Clone, Copy)]
enum Categories {
    Table,
    Slug,
    CategoryType,
    Status,
    ParentId,
}

#[derive(Iden, Clone, Copy)]
enum Transactions {
    Table,
    AccountId,
    CategoryId,
    Status,
    Date,
    Amount,
    MerchantName,
    ExternalId,
}

fn index<T>(
    name: &str,
    table: T,
    columns: &[T],
    unique: bool,
) -> (IndexCreateStatement, IndexDropStatement)
where
    T: Iden + Copy + 'static,
{
    let mut create = Index::create();
    create.name(name).table(table);
    for column in columns {
        create.col(*column);
    }
    if unique {
        create.unique();
    }
    (
        create.to_owned(),
        Index::drop().name(name).table(table).to_owned(),
    )
}

fn indexes() -> Vec<(IndexCreateStatement, IndexDropStatement)> {
    vec![
        index("uidx-users-email", Users::Table, &[Users::Email], true),
        index("uidx-categories-slug", Categories::Table, &[Categories::Slug], true),
        index(
            "uidx-accounts-provider_account_id",
            Accounts::Table,
            &[Accounts::ProviderAccountId],
            true,
        ),
        // NULL provider ids never collide.
        index(
            "uidx-transactions-external_id",
            Transactions::Table,
            &[Transactions::ExternalId],
            true,
        ),
        index("idx-users-status", Users::Table, &[Users::Status], false),
        index(
            "idx-accounts-user_id-status",
            Accounts::Table,
            &[Accounts::UserId, Accounts::Status],
            false,
        ),
        index(
            "idx-categories-category_type-status",
            Categories::Table,
            &[Categories::CategoryType, Categories::Status],
            false,
        ),
        index(
            "idx-categories-parent_id-status",
            Categories::Table,
            &[Categories::ParentId, Categories::Status],
            false,
        ),
        index(
            "idx-transactions-account_id-date",
            Transactions::Table,
            &[Transactions::AccountId, Transactions::Date],
            false,
        ),
        index(
            "idx-transactions-category_id-date",
            Transactions::Table,
            &[Transactions::CategoryId, Transactions::Date],
            false,
        ),
        index(
            "idx-transactions-status-date",
            Transactions::Table,
            &[Transactions::Status, Transactions::Date],
            false,
        ),
        index(
            "idx-transactions-amount-date",
            Transactions::Table,
            &[Transactions::Amount, Transactions::Date],
            false,
        ),
        index(
            "idx-transactions-merchant_name-date",
            Transactions::Table,
            &[Transactions::MerchantName, Transactions::Date],
            false,
        ),
    ]
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (create, _) in indexes() {
            manager.create_index(create).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for (_, drop) in indexes().into_iter().rev() {
            manager.drop_index(drop).await?;
        }
        Ok(())
    }
}
