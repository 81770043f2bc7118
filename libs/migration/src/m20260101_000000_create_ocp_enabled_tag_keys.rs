use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OcpEnabledTagKeys::Table)
                    .if_not_exists()
                    .col(string_len(OcpEnabledTagKeys::Key, 255).not_null())
                    .col(boolean(OcpEnabledTagKeys::Enabled).not_null().default(true))
                    .primary_key(Index::create().col(OcpEnabledTagKeys::Key))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OcpEnabledTagKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OcpEnabledTagKeys {
    #[sea_orm(iden = "reporting_ocpenabledtagkeys")]
    Table,
    Key,
    Enabled,
}
