use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(OcpCostCategory::Table)
                    .if_not_exists()
                    .col(pk_auto(OcpCostCategory::Id))
                    .col(string_len(OcpCostCategory::Name, 255).not_null())
                    .col(string_len(OcpCostCategory::NamespacePattern, 255).not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ocp_cost_category_namespace_pattern")
                    .table(OcpCostCategory::Table)
                    .col(OcpCostCategory::NamespacePattern)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OcpCostCategory::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum OcpCostCategory {
    #[sea_orm(iden = "reporting_ocp_cost_category")]
    Table,
    Id,
    Name,
    NamespacePattern,
}
