//! Initial schema migration - creates all tables from scratch.
//!
//! The complete schema for PayTrack:
//!
//! - `customers`: one row per customer with the running balance
//! - `transactions`: sale/payment rows, signed minor units
//! - `actions`: admin-scoped reversible action log
//! - `actions_archive`: actions moved out by the retention sweep

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum Customers {
    Table,
    Id,
    AdminId,
    Fullname,
    Phone,
    BalanceMinor,
    CreatedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    CustomerId,
    AdminId,
    Kind,
    AmountMinor,
    Description,
    CreatedAt,
}

#[derive(Iden)]
enum Actions {
    Table,
    Id,
    AdminId,
    CustomerId,
    Kind,
    Payload,
    CreatedAt,
    Reversed,
    ReversedAt,
}

#[derive(Iden)]
enum ActionsArchive {
    Table,
    Id,
    AdminId,
    CustomerId,
    Kind,
    Payload,
    CreatedAt,
    Reversed,
    ReversedAt,
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Customers
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Customers::AdminId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Customers::Fullname).string().not_null())
                    .col(ColumnDef::new(Customers::Phone).string().not_null())
                    .col(
                        ColumnDef::new(Customers::BalanceMinor)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Customers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-customers-admin_id-fullname-unique")
                    .table(Customers::Table)
                    .col(Customers::AdminId)
                    .col(Customers::Fullname)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Transactions::CustomerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Transactions::AdminId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Kind).string().not_null())
                    .col(
                        ColumnDef::new(Transactions::AmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Transactions::Description).string())
                    .col(
                        ColumnDef::new(Transactions::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-customer_id")
                            .from(Transactions::Table, Transactions::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-customer_id-created_at")
                    .table(Transactions::Table)
                    .col(Transactions::CustomerId)
                    .col(Transactions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-admin_id")
                    .table(Transactions::Table)
                    .col(Transactions::AdminId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Actions
        // ───────────────────────────────────────────────────────────────────
        //
        // No foreign key on customer_id: the log keeps a back-reference,
        // and it must outlive a deleted customer so undo can restore it.
        manager
            .create_table(
                Table::create()
                    .table(Actions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Actions::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Actions::AdminId).big_integer().not_null())
                    .col(ColumnDef::new(Actions::CustomerId).string().not_null())
                    .col(ColumnDef::new(Actions::Kind).string().not_null())
                    .col(ColumnDef::new(Actions::Payload).text().not_null())
                    .col(ColumnDef::new(Actions::CreatedAt).timestamp().not_null())
                    .col(
                        ColumnDef::new(Actions::Reversed)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(Actions::ReversedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-actions-admin_id-reversed")
                    .table(Actions::Table)
                    .col(Actions::AdminId)
                    .col(Actions::Reversed)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-actions-admin_id-created_at")
                    .table(Actions::Table)
                    .col(Actions::AdminId)
                    .col(Actions::CreatedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Actions archive
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(ActionsArchive::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ActionsArchive::Id)
                            .big_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ActionsArchive::AdminId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActionsArchive::CustomerId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActionsArchive::Kind).string().not_null())
                    .col(ColumnDef::new(ActionsArchive::Payload).text().not_null())
                    .col(
                        ColumnDef::new(ActionsArchive::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(ActionsArchive::Reversed)
                            .boolean()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ActionsArchive::ReversedAt).timestamp())
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Drop in reverse order of creation (respecting FK dependencies)
        manager
            .drop_table(Table::drop().table(ActionsArchive::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Actions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await?;
        Ok(())
    }
}
